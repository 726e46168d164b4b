//! Width adaptation for values crossing between nets of different shapes.
use seqc_ir::{Justify, Signal, Value, rtl::Expr};
use seqc_utils::math;

/// The expression reading `v`.
pub(crate) fn expr(v: &Value) -> Expr {
    match v {
        Value::Const { val, width } => Expr::constant(*val, *width),
        Value::Net(sig) => Expr::Net(sig.name),
    }
}

/// `sig` truncated, sign extended or zero extended to `to` bits.
pub(crate) fn resize(sig: &Signal, to: u64) -> Expr {
    let w = sig.width;
    if to == w {
        Expr::Net(sig.name)
    } else if to < w {
        Expr::slice(sig.name, to - 1, 0)
    } else if sig.signed {
        Expr::concat(vec![
            Expr::replicate(to - w, Expr::slice(sig.name, w - 1, w - 1)),
            Expr::Net(sig.name),
        ])
    } else {
        Expr::concat(vec![Expr::zero(to - w), Expr::Net(sig.name)])
    }
}

/// [resize] for any value. Constants are unsigned.
pub(crate) fn fit(v: &Value, to: u64) -> Expr {
    match v {
        Value::Const { val, .. } => Expr::constant(*val, to),
        Value::Net(sig) => resize(sig, to),
    }
}

/// Width of an operand once it takes part in arithmetic with `other`: an
/// unsigned operand mixed with a signed one gains a zero sign bit.
pub(crate) fn effective_width(v: &Value, other: &Value) -> u64 {
    v.width() + u64::from(!v.signed() && other.signed())
}

fn max_value(width: u64, signed: bool) -> u128 {
    if signed {
        math::mask(width - 1)
    } else {
        math::mask(width)
    }
}

fn min_value(width: u64, signed: bool) -> u128 {
    if signed { 1 << (width - 1) } else { 0 }
}

/// Extra nets a narrowing needs, declared by the caller.
pub(crate) struct Narrowed {
    /// `(name, width, driver)` of an intermediate wire.
    pub wide: Option<(Signal, Expr)>,
    pub value: Expr,
}

/// Convert `src` to the shape of `out`.
///
/// Right justification keeps the low bits of the value, so without `clamp`
/// it wraps; with `clamp` values outside the range of `out` saturate to its
/// minimum or maximum. Left justification keeps the most significant bits
/// (padding zeros below when `out` is wider); with `clamp` a negative value
/// headed for an unsigned output becomes zero and an unsigned value whose
/// top bit would read as a sign becomes the largest positive value.
///
/// `wide` names the intermediate net used by a clamped right
/// justification.
pub(crate) fn narrow(
    src: &Signal,
    out: &Signal,
    justify: Justify,
    clamp: bool,
    wide: &str,
) -> Narrowed {
    let (ws, wo) = (src.width, out.width);
    match justify {
        Justify::Right if !clamp => Narrowed {
            wide: None,
            value: resize(src, wo),
        },
        Justify::Right => {
            let we = ws.max(wo) + 1;
            let x = Signal {
                name: wide.into(),
                width: we,
                signed: src.signed,
                init: 0,
            };
            let driver = resize(src, we);
            let neg = Expr::slice(x.name, we - 1, we - 1);
            let keep = if out.signed { wo - 1 } else { wo };
            let over = if keep > we - 2 {
                Expr::bit(false)
            } else {
                !neg.clone() & Expr::slice(x.name, we - 2, keep).reduce_or()
            };
            let under = if out.signed {
                neg & !Expr::slice(x.name, we - 2, wo - 1).reduce_and()
            } else {
                neg
            };
            let value = Expr::mux(
                over,
                Expr::constant(max_value(wo, out.signed), wo),
                Expr::mux(
                    under,
                    Expr::constant(min_value(wo, out.signed), wo),
                    Expr::slice(x.name, wo - 1, 0),
                ),
            );
            Narrowed {
                wide: Some((x, driver)),
                value,
            }
        }
        Justify::Left => {
            let kept = if wo <= ws {
                Expr::slice(src.name, ws - 1, ws - wo)
            } else {
                Expr::concat(vec![Expr::Net(src.name), Expr::zero(wo - ws)])
            };
            let top = Expr::slice(src.name, ws - 1, ws - 1);
            let value = match (clamp, src.signed, out.signed) {
                (true, true, false) => Expr::mux(top, Expr::zero(wo), kept),
                (true, false, true) => Expr::mux(
                    top,
                    Expr::constant(max_value(wo, true), wo),
                    kept,
                ),
                _ => kept,
            };
            Narrowed { wide: None, value }
        }
    }
}
