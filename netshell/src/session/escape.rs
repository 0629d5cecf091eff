//! Backslash escape decoding for raw terminal input.

/// Decode backslash escapes so callers can type control characters.
///
/// Supports `\n \r \t \\ \' \" \a \b \f \v \e \0`, `\xHH`, `\uXXXX` and
/// one-to-three digit octal (`\003` is Ctrl-C). Anything else, including a
/// malformed `\x` or `\u`, is kept literally.
pub fn decode_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(&next) = chars.peek() else {
            out.push('\\');
            break;
        };

        let simple = match next {
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            '\\' => Some('\\'),
            '\'' => Some('\''),
            '"' => Some('"'),
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            'f' => Some('\x0c'),
            'v' => Some('\x0b'),
            'e' => Some('\x1b'),
            _ => None,
        };
        if let Some(decoded) = simple {
            chars.next();
            out.push(decoded);
            continue;
        }

        match next {
            'x' | 'u' => {
                let width = if next == 'x' { 2 } else { 4 };
                let digits: String = chars.clone().skip(1).take(width).collect();
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => {
                        for _ in 0..=width {
                            chars.next();
                        }
                        out.push(decoded);
                    }
                    None => out.push('\\'),
                }
            }
            '0'..='7' => {
                let mut value = 0u32;
                let mut taken = 0;
                while taken < 3 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                            taken += 1;
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            _ => out.push('\\'),
        }
    }

    out
}
