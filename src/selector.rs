//! Fuzzy service selection for shell commands.
//!
//! Each token is matched case-insensitively against the service names in three
//! tiers, and only the best non-empty tier counts:
//!
//! 1. exact name (`api` selects `api` but not `search-api`)
//! 2. name prefix (`buyer` selects `buyer-frontend`)
//! 3. substring (`frontend` selects every `*-frontend`)
//!
//! Every service in the winning tier is selected, so there is no tie to break.
//! The result is the union over all tokens in registration order.

use crate::errors::SelectorError;

/// Services picked by a selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Registration indices, ascending.
    pub indices: Vec<usize>,
    /// Tokens that matched nothing.
    pub unmatched: Vec<String>,
}

/// Resolve `tokens` against `names`. Fails only when nothing at all matches.
pub fn resolve<S: AsRef<str>>(names: &[S], tokens: &[String]) -> Result<Selection, SelectorError> {
    let lowered: Vec<String> = names.iter().map(|n| n.as_ref().to_lowercase()).collect();
    let mut picked = vec![false; names.len()];
    let mut unmatched = Vec::new();

    for token in tokens {
        let matches = match_token(&lowered, &token.to_lowercase());
        if matches.is_empty() {
            unmatched.push(token.clone());
        }
        for i in matches {
            picked[i] = true;
        }
    }

    let indices: Vec<usize> = picked
        .iter()
        .enumerate()
        .filter(|(_, p)| **p)
        .map(|(i, _)| i)
        .collect();

    if indices.is_empty() {
        return Err(SelectorError::NoMatch {
            tokens: tokens.to_vec(),
        });
    }
    Ok(Selection { indices, unmatched })
}

fn match_token(lowered: &[String], token: &str) -> Vec<usize> {
    if token.is_empty() {
        return Vec::new();
    }
    let tiers: [&dyn Fn(&str) -> bool; 3] = [
        &|name: &str| name == token,
        &|name: &str| name.starts_with(token),
        &|name: &str| name.contains(token),
    ];
    for tier in tiers {
        let hits: Vec<usize> = lowered
            .iter()
            .enumerate()
            .filter(|(_, n)| tier(n.as_str()))
            .map(|(i, _)| i)
            .collect();
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["api", "buyer-frontend", "supplier-frontend", "search-api"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn tokens(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prefix_selects_single_service() {
        let sel = resolve(&names(), &tokens(&["buyer"])).unwrap();
        assert_eq!(sel.indices, vec![1]);
        assert!(sel.unmatched.is_empty());
    }

    #[test]
    fn test_substring_selects_all_frontends() {
        let sel = resolve(&names(), &tokens(&["frontend"])).unwrap();
        assert_eq!(sel.indices, vec![1, 2]);
    }

    #[test]
    fn test_exact_beats_substring() {
        let sel = resolve(&names(), &tokens(&["api"])).unwrap();
        assert_eq!(sel.indices, vec![0]);
    }

    #[test]
    fn test_case_insensitive() {
        let sel = resolve(&names(), &tokens(&["SEARCH"])).unwrap();
        assert_eq!(sel.indices, vec![3]);
    }

    #[test]
    fn test_union_in_registration_order() {
        let sel = resolve(&names(), &tokens(&["search", "buyer", "api"])).unwrap();
        assert_eq!(sel.indices, vec![0, 1, 3]);
    }

    #[test]
    fn test_unmatched_tokens_are_reported() {
        let sel = resolve(&names(), &tokens(&["buyer", "nope"])).unwrap();
        assert_eq!(sel.indices, vec![1]);
        assert_eq!(sel.unmatched, vec!["nope"]);
    }

    #[test]
    fn test_no_match_is_error() {
        let err = resolve(&names(), &tokens(&["zzz"])).unwrap_err();
        assert_eq!(
            err,
            SelectorError::NoMatch {
                tokens: vec!["zzz".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_tokens_match_nothing() {
        assert!(resolve(&names(), &[]).is_err());
    }
}
