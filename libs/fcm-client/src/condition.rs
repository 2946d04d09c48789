/// Topic condition validation
///
/// FCM accepts boolean expressions over topic membership such as
/// `'TopicA' in topics && ('TopicB' in topics || 'TopicC' in topics)`.
/// A condition is checked in two passes before any request is made:
///
/// 1. Format pass: the string must tokenize completely into the grammar
///    tokens `topics`, `in`, whitespace, `(`, `)`, `&&`, `!`, `||` and
///    single-quoted literals.
/// 2. Topic pass: every quoted literal must be a non-empty run of the topic
///    alphabet `[A-Za-z0-9-_.~%]`.
///
/// A condition with no quoted literal at all is rejected.
use std::fmt;

/// Why a condition was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// Character at byte offset `pos` does not start any grammar token
    UnexpectedChar { pos: usize, ch: char },
    /// Opening quote at `pos` has no closing quote
    UnterminatedLiteral { pos: usize },
    /// `''` at `pos`
    EmptyTopic { pos: usize },
    /// Literal at `pos` contains a character outside the topic alphabet
    InvalidTopic { pos: usize, topic: String },
    /// No quoted topic in the condition
    NoTopics,
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionError::UnexpectedChar { pos, ch } => {
                write!(f, "unexpected character {:?} at offset {}", ch, pos)
            }
            ConditionError::UnterminatedLiteral { pos } => {
                write!(f, "unterminated topic literal at offset {}", pos)
            }
            ConditionError::EmptyTopic { pos } => write!(f, "empty topic literal at offset {}", pos),
            ConditionError::InvalidTopic { pos, topic } => {
                write!(f, "invalid topic name '{}' at offset {}", topic, pos)
            }
            ConditionError::NoTopics => write!(f, "condition names no topics"),
        }
    }
}

impl std::error::Error for ConditionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Topics,
    In,
    Space,
    Open,
    Close,
    And,
    Or,
    Not,
    /// Quoted literal content and the offset of its opening quote
    Literal(&'a str, usize),
}

/// Topic alphabet: letters, digits and `-_.~%`
pub fn is_topic_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%')
}

/// ASCII whitespace only; Unicode spaces are rejected
fn is_condition_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Whether `topic` is a bare topic name FCM accepts
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty() && topic.chars().all(is_topic_char)
}

fn tokenize(condition: &str) -> Result<Vec<Token<'_>>, ConditionError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < condition.len() {
        let rest = &condition[pos..];

        let (token, len) = if rest.starts_with("topics") {
            (Token::Topics, "topics".len())
        } else if rest.starts_with("in") {
            (Token::In, "in".len())
        } else if rest.starts_with("&&") {
            (Token::And, 2)
        } else if rest.starts_with("||") {
            (Token::Or, 2)
        } else if rest.starts_with('!') {
            (Token::Not, 1)
        } else if rest.starts_with('(') {
            (Token::Open, 1)
        } else if rest.starts_with(')') {
            (Token::Close, 1)
        } else if rest.starts_with('\'') {
            let end = rest[1..]
                .find('\'')
                .ok_or(ConditionError::UnterminatedLiteral { pos })?;
            (Token::Literal(&rest[1..=end], pos), end + 2)
        } else {
            // pos < len and every token ends on a char boundary
            let ch = rest.chars().next().unwrap_or_default();
            if is_condition_space(ch) {
                let len = rest
                    .find(|c: char| !is_condition_space(c))
                    .unwrap_or(rest.len());
                (Token::Space, len)
            } else {
                return Err(ConditionError::UnexpectedChar { pos, ch });
            }
        };

        tokens.push(token);
        pos += len;
    }

    Ok(tokens)
}

/// Format pass: tokenize and collect the quoted literals
fn format_pass(condition: &str) -> Result<Vec<(&str, usize)>, ConditionError> {
    Ok(tokenize(condition)?
        .into_iter()
        .filter_map(|token| match token {
            Token::Literal(topic, pos) => Some((topic, pos)),
            _ => None,
        })
        .collect())
}

/// Topic pass: every literal must be a valid topic name
fn topic_pass(literals: &[(&str, usize)]) -> Result<(), ConditionError> {
    if literals.is_empty() {
        return Err(ConditionError::NoTopics);
    }

    for &(topic, pos) in literals {
        if topic.is_empty() {
            return Err(ConditionError::EmptyTopic { pos });
        }
        if !is_valid_topic(topic) {
            return Err(ConditionError::InvalidTopic {
                pos,
                topic: topic.to_string(),
            });
        }
    }

    Ok(())
}

/// Check a condition, returning the topics it references in order of appearance
pub fn check(condition: &str) -> Result<Vec<&str>, ConditionError> {
    let literals = format_pass(condition)?;
    topic_pass(&literals)?;
    Ok(literals.into_iter().map(|(topic, _)| topic).collect())
}

/// Validate a topic condition
pub fn validate(condition: &str) -> bool {
    check(condition).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "'TopicA' in topics && ('TopicB' in topics || 'TopicC' in topics)";

    #[test]
    fn test_valid_condition() {
        assert!(validate(VALID));
        assert_eq!(check(VALID).unwrap(), vec!["TopicA", "TopicB", "TopicC"]);
    }

    #[test]
    fn test_single_topic_and_negation() {
        assert!(validate("'news' in topics"));
        assert!(validate("!('news' in topics) && 'sports.eu~1%' in topics"));
        assert!(validate("\t'a-b_c'\nin topics"));
    }

    #[test]
    fn test_illegal_connective_rejected() {
        let condition =
            "'TopicA' in topics and some other text ('TopicB' in topics || 'TopicC' in topics)";
        assert!(!validate(condition));
        assert_eq!(
            check(condition),
            Err(ConditionError::UnexpectedChar { pos: 19, ch: 'a' })
        );
    }

    #[test]
    fn test_invalid_topic_character_rejected() {
        assert!(!validate("'TopicA$' in topics"));
        assert_eq!(
            check("'TopicA' in topics || 'Topic B' in topics"),
            Err(ConditionError::InvalidTopic {
                pos: 22,
                topic: "Topic B".to_string()
            })
        );
    }

    #[test]
    fn test_unterminated_literal_rejected() {
        assert_eq!(
            check("'TopicA in topics"),
            Err(ConditionError::UnterminatedLiteral { pos: 0 })
        );
    }

    #[test]
    fn test_empty_and_topicless_conditions_rejected() {
        assert_eq!(check(""), Err(ConditionError::NoTopics));
        assert_eq!(check("  ( ) in topics"), Err(ConditionError::NoTopics));
        assert_eq!(check("'' in topics"), Err(ConditionError::EmptyTopic { pos: 0 }));
    }

    #[test]
    fn test_single_ampersand_and_pipe_rejected() {
        assert!(!validate("'a' in topics & 'b' in topics"));
        assert!(!validate("'a' in topics | 'b' in topics"));
        assert!(!validate("\"a\" in topics"));
    }

    #[test]
    fn test_non_ascii_rejected_without_panicking() {
        assert!(!validate("'a' in topics ∧ 'b' in topics"));
        assert!(!validate("'caf\u{e9}' in topics"));
    }

    #[test]
    fn test_unicode_whitespace_rejected() {
        assert_eq!(
            check("'TopicA'\u{00A0}in topics"),
            Err(ConditionError::UnexpectedChar { pos: 8, ch: '\u{00A0}' })
        );
        assert!(!validate("'TopicA'\u{3000}in\u{3000}topics"));
        assert!(validate("'TopicA'\x0bin\x0ctopics\r\n"));
    }

    #[test]
    fn test_topic_name() {
        assert!(is_valid_topic("TopicA"));
        assert!(is_valid_topic("a-b_c.d~e%20"));
        assert!(!is_valid_topic("TopicA$"));
        assert!(!is_valid_topic(""));
        assert!(!is_valid_topic("/topics/a"));
    }
}
