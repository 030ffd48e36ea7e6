//! Order-preserving string keys.
//!
//! A key is an integer part (a head letter encoding its length, then digits)
//! followed by an optional fraction. Keys compare as plain strings, and a new
//! key can always be generated between two existing ones without touching
//! either.

use crate::FractionalIndexError;

const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const ZERO: u8 = DIGITS[0];
const LAST: u8 = DIGITS[DIGITS.len() - 1];

/// The key generated when there are no neighbours
pub const INTEGER_ZERO: &str = "a0";

/// `A` followed by 26 zero digits; no key can sort before it
const SMALLEST_INTEGER: &str = "A00000000000000000000000000";

type Result<T> = std::result::Result<T, FractionalIndexError>;

/// Generate a key that sorts strictly between `a` and `b`.
///
/// `None` stands for an open boundary on that side.
pub fn generate_key_between(a: Option<&str>, b: Option<&str>) -> Result<String> {
    if let Some(a) = a {
        validate_key(a)?;
    }
    if let Some(b) = b {
        validate_key(b)?;
    }

    match (a, b) {
        (None, None) => Ok(INTEGER_ZERO.to_string()),
        (None, Some(b)) => {
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ib == SMALLEST_INTEGER {
                return Ok(format!("{ib}{}", midpoint(b"", Some(fb.as_bytes()))?));
            }
            if ib.len() < b.len() {
                return Ok(ib.to_string());
            }
            decrement_integer(ib)?.ok_or(FractionalIndexError::Exhausted)
        }
        (Some(a), None) => {
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            match increment_integer(ia)? {
                Some(next) => Ok(next),
                None => Ok(format!("{ia}{}", midpoint(fa.as_bytes(), None)?)),
            }
        }
        (Some(a), Some(b)) => {
            if a >= b {
                return Err(FractionalIndexError::OutOfOrder {
                    a: a.to_string(),
                    b: b.to_string(),
                });
            }
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ia == ib {
                return Ok(format!(
                    "{ia}{}",
                    midpoint(fa.as_bytes(), Some(fb.as_bytes()))?
                ));
            }
            let next = increment_integer(ia)?.ok_or(FractionalIndexError::Exhausted)?;
            if next.as_str() < b {
                Ok(next)
            } else {
                Ok(format!("{ia}{}", midpoint(fa.as_bytes(), None)?))
            }
        }
    }
}

fn digit_value(digit: u8) -> Result<usize> {
    DIGITS
        .iter()
        .position(|&d| d == digit)
        .ok_or_else(|| FractionalIndexError::InvalidKey(char::from(digit).to_string()))
}

/// Fraction strictly between fractions `a` and `b`, neither ending in zero
fn midpoint(a: &[u8], b: Option<&[u8]>) -> Result<String> {
    if let Some(b) = b {
        if a >= b {
            return Err(FractionalIndexError::OutOfOrder {
                a: String::from_utf8_lossy(a).into_owned(),
                b: String::from_utf8_lossy(b).into_owned(),
            });
        }
    }
    if a.last() == Some(&ZERO) || b.is_some_and(|b| b.last() == Some(&ZERO)) {
        return Err(FractionalIndexError::TrailingZero);
    }

    if let Some(b) = b {
        // Length of the common prefix, padding `a` with zeros
        let n = b
            .iter()
            .enumerate()
            .take_while(|&(i, &digit)| a.get(i).copied().unwrap_or(ZERO) == digit)
            .count();
        if n > 0 {
            let prefix = String::from_utf8_lossy(&b[..n]).into_owned();
            let rest = midpoint(a.get(n..).unwrap_or_default(), Some(&b[n..]))?;
            return Ok(prefix + &rest);
        }
    }

    let digit_a = match a.first() {
        Some(&digit) => digit_value(digit)?,
        None => 0,
    };
    let digit_b = match b.and_then(|b| b.first()) {
        Some(&digit) => digit_value(digit)?,
        None => DIGITS.len(),
    };

    if digit_b - digit_a > 1 {
        // Rounds half up
        let mid = (digit_a + digit_b + 1) / 2;
        Ok(char::from(DIGITS[mid]).to_string())
    } else if let Some(b) = b.filter(|b| b.len() > 1) {
        Ok(char::from(b[0]).to_string())
    } else {
        let rest = midpoint(a.get(1..).unwrap_or_default(), None)?;
        Ok(format!("{}{rest}", char::from(DIGITS[digit_a])))
    }
}

fn integer_length(head: u8) -> Result<usize> {
    match head {
        b'a'..=b'z' => Ok(usize::from(head - b'a') + 2),
        b'A'..=b'Z' => Ok(usize::from(b'Z' - head) + 2),
        _ => Err(FractionalIndexError::InvalidKey(char::from(head).to_string())),
    }
}

fn integer_part(key: &str) -> Result<&str> {
    let head = key
        .bytes()
        .next()
        .ok_or_else(|| FractionalIndexError::InvalidKey(String::new()))?;
    let length = integer_length(head)?;
    key.get(..length)
        .ok_or_else(|| FractionalIndexError::InvalidKey(key.to_string()))
}

fn validate_key(key: &str) -> Result<()> {
    if key == SMALLEST_INTEGER || !key.is_ascii() {
        return Err(FractionalIndexError::InvalidKey(key.to_string()));
    }
    let integer = integer_part(key)?;
    if key.len() > integer.len() && key.as_bytes().last() == Some(&ZERO) {
        return Err(FractionalIndexError::InvalidKey(key.to_string()));
    }
    key.bytes().skip(1).try_for_each(|digit| digit_value(digit).map(drop))
}

fn split_integer(integer: &str) -> Result<(u8, Vec<u8>)> {
    let bytes = integer.as_bytes();
    let (&head, digits) = bytes
        .split_first()
        .ok_or_else(|| FractionalIndexError::InvalidKey(integer.to_string()))?;
    if integer_length(head)? != bytes.len() {
        return Err(FractionalIndexError::InvalidKey(integer.to_string()));
    }
    Ok((head, digits.to_vec()))
}

fn join_integer(head: u8, digits: &[u8]) -> String {
    let mut key = String::with_capacity(digits.len() + 1);
    key.push(char::from(head));
    key.extend(digits.iter().map(|&d| char::from(d)));
    key
}

fn increment_integer(integer: &str) -> Result<Option<String>> {
    let (head, mut digits) = split_integer(integer)?;

    let mut carry = true;
    for digit in digits.iter_mut().rev() {
        let next = digit_value(*digit)? + 1;
        if next == DIGITS.len() {
            *digit = ZERO;
        } else {
            *digit = DIGITS[next];
            carry = false;
            break;
        }
    }

    if !carry {
        return Ok(Some(join_integer(head, &digits)));
    }
    match head {
        b'Z' => Ok(Some(join_integer(b'a', &[ZERO]))),
        b'z' => Ok(None),
        _ => {
            let head = head + 1;
            if head > b'a' {
                digits.push(ZERO);
            } else {
                digits.pop();
            }
            Ok(Some(join_integer(head, &digits)))
        }
    }
}

fn decrement_integer(integer: &str) -> Result<Option<String>> {
    let (head, mut digits) = split_integer(integer)?;

    let mut borrow = true;
    for digit in digits.iter_mut().rev() {
        let value = digit_value(*digit)?;
        if value == 0 {
            *digit = LAST;
        } else {
            *digit = DIGITS[value - 1];
            borrow = false;
            break;
        }
    }

    if !borrow {
        return Ok(Some(join_integer(head, &digits)));
    }
    match head {
        b'a' => Ok(Some(join_integer(b'Z', &[LAST]))),
        b'A' => Ok(None),
        _ => {
            let head = head - 1;
            if head < b'Z' {
                digits.push(LAST);
            } else {
                digits.pop();
            }
            Ok(Some(join_integer(head, &digits)))
        }
    }
}
