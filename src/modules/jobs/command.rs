use std::collections::BTreeMap;

/// A transcoding command with `{{name}}` placeholders.
///
/// Placeholders are resolved against the request's input and output name
/// maps. A placeholder that matches no declared name is left verbatim in
/// the resolved command (documented pass-through behavior, callers see
/// the literal `{{name}}` in their failing ffmpeg invocation).
pub struct CommandTemplate<'a> {
    template: &'a str,
}

impl<'a> CommandTemplate<'a> {
    pub fn new(template: &'a str) -> Self {
        Self { template }
    }

    /// Substitutes every `{{name}}` occurrence for each declared input
    /// and output name. Names are case-sensitive; input and output name
    /// sets never collide (enforced at submission).
    pub fn resolve(
        &self,
        inputs: &BTreeMap<String, String>,
        outputs: &BTreeMap<String, String>,
    ) -> String {
        let mut command = self.template.to_string();
        for (key, path) in inputs.iter().chain(outputs.iter()) {
            let placeholder = format!("{{{{{}}}}}", key);
            command = command.replace(&placeholder, path);
        }
        command
    }
}

/// Splits a resolved command into an argument vector, keeping single- or
/// double-quoted spans together as one token with the quotes stripped.
pub fn tokenize(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = command.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '"' || c == '\'' {
            let quote = c;
            chars.next();
            for ch in chars.by_ref() {
                if ch == quote {
                    break;
                }
                token.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '"' || ch == '\'' {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        args.push(token);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_substitutes_inputs_and_outputs() {
        let inputs = map(&[("in1", "/tmp/job/input-abc")]);
        let outputs = map(&[("out1", "/tmp/job/result.mp4")]);

        let resolved = CommandTemplate::new("-i {{in1}} {{out1}}").resolve(&inputs, &outputs);
        assert_eq!(resolved, "-i /tmp/job/input-abc /tmp/job/result.mp4");

        let tokens = tokenize(&resolved);
        assert_eq!(
            tokens,
            vec!["-i", "/tmp/job/input-abc", "/tmp/job/result.mp4"]
        );
    }

    #[test]
    fn test_resolve_replaces_every_occurrence() {
        let inputs = map(&[("in", "a.mkv")]);
        let resolved =
            CommandTemplate::new("{{in}} -i {{in}}").resolve(&inputs, &BTreeMap::new());
        assert_eq!(resolved, "a.mkv -i a.mkv");
    }

    #[test]
    fn test_undeclared_placeholder_passes_through() {
        let inputs = map(&[("in1", "/tmp/a")]);
        let resolved =
            CommandTemplate::new("-i {{in1}} {{missing}}").resolve(&inputs, &BTreeMap::new());
        assert_eq!(resolved, "-i /tmp/a {{missing}}");
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let inputs = map(&[("In1", "/tmp/a")]);
        let resolved = CommandTemplate::new("-i {{in1}}").resolve(&inputs, &BTreeMap::new());
        assert_eq!(resolved, "-i {{in1}}");
    }

    #[test]
    fn test_tokenize_keeps_double_quoted_span() {
        let tokens = tokenize("-f \"my file.mp4\" -o out.mp4");
        assert_eq!(tokens, vec!["-f", "my file.mp4", "-o", "out.mp4"]);
    }

    #[test]
    fn test_tokenize_keeps_single_quoted_span() {
        let tokens = tokenize("-metadata 'title=My Movie' out.mp4");
        assert_eq!(tokens, vec!["-metadata", "title=My Movie", "out.mp4"]);
    }

    #[test]
    fn test_tokenize_empty_command() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t  ").is_empty());
    }

    #[test]
    fn test_tokenize_unterminated_quote_takes_rest() {
        let tokens = tokenize("-vf \"scale=640:480");
        assert_eq!(tokens, vec!["-vf", "scale=640:480"]);
    }

    #[test]
    fn test_tokenize_empty_quotes_yield_empty_token() {
        let tokens = tokenize("-metadata \"\" out.mp4");
        assert_eq!(tokens, vec!["-metadata", "", "out.mp4"]);
    }
}
