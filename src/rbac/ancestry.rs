/// Decomposes a hierarchical resource name into its cumulative ancestor
/// chain, most general first: `"acme::deployer::api1"` yields
/// `["acme", "acme::deployer", "acme::deployer::api1"]`.
///
/// A grant held on any name in the chain applies to the full name.
#[must_use]
pub fn ancestor_chain(name: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut prefix = String::with_capacity(name.len());
    for segment in name.split("::") {
        if !prefix.is_empty() {
            prefix.push_str("::");
        }
        prefix.push_str(segment);
        chain.push(prefix.clone());
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment() {
        assert_eq!(ancestor_chain("acme"), vec!["acme"]);
    }

    #[test]
    fn test_two_segments() {
        assert_eq!(
            ancestor_chain("acme::deployer"),
            vec!["acme", "acme::deployer"]
        );
    }

    #[test]
    fn test_three_segments() {
        assert_eq!(
            ancestor_chain("acme::deployer::api1"),
            vec!["acme", "acme::deployer", "acme::deployer::api1"]
        );
    }

    #[test]
    fn test_chain_is_ordered_and_complete() {
        let chain = ancestor_chain("a::b::c::d");
        assert_eq!(chain.len(), 4);
        for window in chain.windows(2) {
            assert!(window[1].starts_with(window[0].as_str()));
        }
    }
}
