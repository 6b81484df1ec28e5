use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Lowercases terms so keyword and text lookups agree on case
pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens
            .into_iter()
            .map(|token| {
                if token.text.chars().any(char::is_uppercase) {
                    let folded = token.text.to_lowercase();
                    token.rewritten(folded)
                } else {
                    token
                }
            })
            .collect()
    }

    fn name(&self) -> &str {
        "lowercase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_mixed_case_only() {
        let tokens = vec![Token::new("Grüße", 0, 0), Token::new("plain", 1, 7)];
        let folded = LowercaseFilter.filter(tokens);
        assert_eq!(folded[0], Token::new("grüße", 0, 0));
        assert_eq!(folded[1].text, "plain");
    }
}
