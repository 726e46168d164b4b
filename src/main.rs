use seqc::driver;
use seqc_utils::SeqResult;

fn main() -> SeqResult<()> {
    driver::run_compiler()
}
