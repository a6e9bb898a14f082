//! Redis-style glob matching for `KEYS` patterns
//!
//! Supports `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\` escapes.

/// Returns true when `key` matches `pattern` in full
pub fn glob_match(key: &str, pattern: &str) -> bool {
    match_from(key.as_bytes(), pattern.as_bytes(), 0, 0)
}

fn match_from(key: &[u8], pattern: &[u8], k_idx: usize, p_idx: usize) -> bool {
    if p_idx >= pattern.len() {
        return k_idx >= key.len();
    }

    match pattern[p_idx] {
        b'*' => {
            // Collapse runs of '*' before trying every split point
            let mut next = p_idx + 1;
            while next < pattern.len() && pattern[next] == b'*' {
                next += 1;
            }
            (k_idx..=key.len()).any(|i| match_from(key, pattern, i, next))
        }
        b'?' => k_idx < key.len() && match_from(key, pattern, k_idx + 1, p_idx + 1),
        b'[' => match class_end(pattern, p_idx) {
            Some(end) => {
                k_idx < key.len()
                    && class_matches(&pattern[p_idx + 1..end], key[k_idx])
                    && match_from(key, pattern, k_idx + 1, end + 1)
            }
            // Unterminated class: treat '[' literally
            None => literal(key, pattern, k_idx, p_idx, b'['),
        },
        b'\\' if p_idx + 1 < pattern.len() => {
            k_idx < key.len()
                && key[k_idx] == pattern[p_idx + 1]
                && match_from(key, pattern, k_idx + 1, p_idx + 2)
        }
        c => literal(key, pattern, k_idx, p_idx, c),
    }
}

fn literal(key: &[u8], pattern: &[u8], k_idx: usize, p_idx: usize, c: u8) -> bool {
    k_idx < key.len() && key[k_idx] == c && match_from(key, pattern, k_idx + 1, p_idx + 1)
}

/// Index of the `]` closing the class opened at `open`
fn class_end(pattern: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < pattern.len() {
        match pattern[i] {
            b'\\' => i += 2,
            b']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn class_matches(class: &[u8], c: u8) -> bool {
    let (negate, class) = match class.first() {
        Some(b'^') => (true, &class[1..]),
        _ => (false, class),
    };

    let mut matched = false;
    let mut i = 0;
    while i < class.len() {
        if class[i] == b'\\' && i + 1 < class.len() {
            matched |= class[i + 1] == c;
            i += 2;
        } else if i + 2 < class.len() && class[i + 1] == b'-' {
            let (lo, hi) = if class[i] <= class[i + 2] {
                (class[i], class[i + 2])
            } else {
                (class[i + 2], class[i])
            };
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= class[i] == c;
            i += 1;
        }
    }

    matched != negate
}
