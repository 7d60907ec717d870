//! Path templates with `:name` placeholders.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;

/// Characters escaped when a value is substituted into a path.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Replaces `:name` tokens in `pattern` with percent-encoded argument values.
///
/// A token is a `:` followed by ASCII letters, digits or `_`. Tokens without a
/// matching argument are left as they are; repeated tokens are all replaced.
///
/// # Examples
///
/// ```
/// use laze::pattern_to_path;
///
/// let path = pattern_to_path("/api/model/:objectId/sub", [("objectId", "1")]);
/// assert_eq!(path, "/api/model/1/sub");
///
/// let path = pattern_to_path("/files/:name", [("name", "a b/c")]);
/// assert_eq!(path, "/files/a%20b%2Fc");
/// ```
pub fn pattern_to_path<I, K, V>(pattern: &str, arguments: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let arguments: HashMap<String, String> = arguments
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    let mut path = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find(':') {
        path.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..len];

        match arguments.get(name) {
            Some(value) if !name.is_empty() => {
                path.extend(utf8_percent_encode(value, PATH_SEGMENT));
            }
            _ => {
                path.push(':');
                path.push_str(name);
            }
        }
        rest = &after[len..];
    }
    path.push_str(rest);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_ARGS: [(&str, &str); 0] = [];

    #[test]
    fn test_single_token() {
        assert_eq!(
            pattern_to_path("/api/model/:objectId/sub", [("objectId", "3")]),
            "/api/model/3/sub"
        );
        assert_eq!(pattern_to_path("/api/model", NO_ARGS), "/api/model");
    }

    #[test]
    fn test_multiple_tokens() {
        assert_eq!(
            pattern_to_path(
                "/api/model/:objectId/sub/rel/:sub",
                [("objectId", "4"), ("sub", "test")]
            ),
            "/api/model/4/sub/rel/test"
        );
        assert_eq!(
            pattern_to_path(
                "/api/sub/:sub/users/:userId/el/rel",
                [("userId", "5-U-12"), ("sub", "test2")]
            ),
            "/api/sub/test2/users/5-U-12/el/rel"
        );
    }

    #[test]
    fn test_repeated_and_unknown_tokens() {
        assert_eq!(
            pattern_to_path("/:a/:b/:a", [("a", "x")]),
            "/x/:b/x"
        );
    }

    #[test]
    fn test_tokens_match_whole_names() {
        assert_eq!(
            pattern_to_path("/:id/:idx", [("id", "1"), ("idx", "2")]),
            "/1/2"
        );
        assert_eq!(pattern_to_path("/:idx", [("id", "1")]), "/:idx");
    }

    #[test]
    fn test_values_are_escaped() {
        assert_eq!(
            pattern_to_path("www.yourdomain.com/:object/:date", [
                ("object", "MyModel"),
                ("date", "2018-02-01 10:10:04"),
            ]),
            "www.yourdomain.com/MyModel/2018-02-01%2010:10:04"
        );
        assert_eq!(pattern_to_path("/q/:v", [("v", "a?b#c")]), "/q/a%3Fb%23c");
    }

    #[test]
    fn test_bare_colons_are_kept() {
        assert_eq!(
            pattern_to_path("http://host:8080/:id", [("id", "7")]),
            "http://host:8080/7"
        );
        assert_eq!(pattern_to_path("/a:/b", [("", "x")]), "/a:/b");
    }
}
