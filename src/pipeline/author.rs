//! Author-name query detection.
//!
//! A query "looks like" a person's name when it is 2 to 6 tokens, each
//! capitalized (initials like `J.R.R.` allowed), with no digits and no field
//! syntax. Such queries are sent author-scoped first.

const MIN_TOKENS: usize = 2;
const MAX_TOKENS: usize = 6;

/// Lowercase particles that commonly appear inside names.
const PARTICLES: &[&str] = &["de", "da", "van", "von", "der", "la", "le", "del", "di"];

pub fn looks_like_author_name(query: &str) -> bool {
    let query = query.trim();
    if query.contains(':') || query.contains('"') {
        return false;
    }

    let tokens: Vec<&str> = query.split_whitespace().collect();
    if !(MIN_TOKENS..=MAX_TOKENS).contains(&tokens.len()) {
        return false;
    }

    let capitalized = tokens.iter().filter(|t| is_capitalized_name_token(t)).count();
    let particles = tokens
        .iter()
        .filter(|t| PARTICLES.contains(t))
        .count();

    capitalized >= MIN_TOKENS && capitalized + particles == tokens.len()
}

fn is_capitalized_name_token(token: &str) -> bool {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_uppercase()
        && token
            .chars()
            .all(|c| c.is_alphabetic() || c == '.' || c == '\'' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(looks_like_author_name("Frank Herbert"));
        assert!(looks_like_author_name("Ursula K. Le Guin"));
        assert!(looks_like_author_name("J.R.R. Tolkien"));
        assert!(looks_like_author_name("Gabriel García Márquez"));
        assert!(looks_like_author_name("Ludwig van Beethoven"));
        assert!(looks_like_author_name("Flannery O'Connor"));
    }

    #[test]
    fn test_not_names() {
        assert!(!looks_like_author_name("Dune"));
        assert!(!looks_like_author_name("the left hand of darkness"));
        assert!(!looks_like_author_name("Catch 22"));
        assert!(!looks_like_author_name("inauthor:Herbert Frank"));
        assert!(!looks_like_author_name("A B C D E F G"));
        assert!(!looks_like_author_name("War and Peace"));
        assert!(!looks_like_author_name(""));
    }
}
