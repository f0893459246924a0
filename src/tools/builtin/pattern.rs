//! Translation of Unicode (CLDR) date patterns to chrono format strings.
//!
//! Models phrase formats the way most platforms document them
//! (`yyyy-MM-dd`, `h:mm a`, `EEEE, MMMM d`), so tool arguments arrive in that
//! dialect. Quoted runs (`'T'`) are literals and `''` is a single quote.

/// Convert a Unicode date pattern into a `chrono::format::strftime` string.
pub fn to_strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let mut run = 1;
        while chars.get(i + run) == Some(&c) {
            run += 1;
        }
        match field(c, run) {
            Some(spec) => out.push_str(spec),
            None => (0..run).for_each(|_| push_literal(&mut out, c)),
        }
        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

fn field(symbol: char, run: usize) -> Option<&'static str> {
    let spec = match (symbol, run) {
        ('y' | 'Y' | 'u', 2) => "%y",
        ('y' | 'Y' | 'u', _) => "%Y",
        ('M' | 'L', 1) => "%-m",
        ('M' | 'L', 2) => "%m",
        ('M' | 'L', 3) => "%b",
        ('M' | 'L', _) => "%B",
        ('d', 1) => "%-d",
        ('d', _) => "%d",
        ('D', 1 | 2) => "%-j",
        ('D', _) => "%j",
        ('E' | 'e' | 'c', 1..=3) => "%a",
        ('E' | 'e' | 'c', _) => "%A",
        ('H', 1) => "%-H",
        ('H', _) => "%H",
        ('h', 1) => "%-I",
        ('h', _) => "%I",
        ('m', 1) => "%-M",
        ('m', _) => "%M",
        ('s', 1) => "%-S",
        ('s', _) => "%S",
        ('S', 1..=3) => "%3f",
        ('S', _) => "%6f",
        ('a', _) => "%p",
        ('z', 1..=3) => "%Z",
        ('Z', 1..=3) | ('x', _) => "%z",
        ('X', _) | ('Z', _) => "%:z",
        _ => return None,
    };
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_numeric_date_patterns() {
        assert_eq!(to_strftime("yyyy-MM-dd"), "%Y-%m-%d");
        assert_eq!(to_strftime("MM/dd/yyyy"), "%m/%d/%Y");
        assert_eq!(to_strftime("M/d/yy"), "%-m/%-d/%y");
    }

    #[test]
    fn converts_time_patterns() {
        assert_eq!(to_strftime("HH:mm:ss"), "%H:%M:%S");
        assert_eq!(to_strftime("h:mm:ss a"), "%-I:%M:%S %p");
    }

    #[test]
    fn converts_text_fields() {
        assert_eq!(to_strftime("EEEE, MMMM d, y"), "%A, %B %-d, %Y");
        assert_eq!(to_strftime("EEE MMM d"), "%a %b %-d");
    }

    #[test]
    fn quoted_text_is_literal() {
        assert_eq!(to_strftime("yyyy-MM-dd'T'HH:mm:ss"), "%Y-%m-%dT%H:%M:%S");
        assert_eq!(to_strftime("h 'o''clock'"), "%-I o'clock");
        assert_eq!(to_strftime("''yy"), "'%y");
    }

    #[test]
    fn unknown_letters_and_percent_are_escaped() {
        assert_eq!(to_strftime("Q yyyy"), "Q %Y");
        assert_eq!(to_strftime("100% d"), "100%% %-d");
    }
}
