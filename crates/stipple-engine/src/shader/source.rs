/// Expands the `::` line-break shorthand into real newlines.
///
/// Lets short shaders live in single-line string literals.
pub fn preprocess_source(source: &str) -> String {
    source.replace("::", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_colon_becomes_newline() {
        assert_eq!(preprocess_source("#version 450::void main() {}"), "#version 450\nvoid main() {}");
    }

    #[test]
    fn plain_source_is_unchanged() {
        let src = "void main() {\n}\n";
        assert_eq!(preprocess_source(src), src);
    }
}
