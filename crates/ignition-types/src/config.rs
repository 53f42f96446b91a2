use std::collections::BTreeMap;

/// A dynamic per-call/per-load configuration map.
///
/// `BTreeMap` gives us key-set + value equality and deterministic iteration
/// for free, which is all `has_config_changed` needs; a tagged-sum value
/// type would be unwarranted, the domain is uniform strings.
pub type Config = BTreeMap<String, String>;

/// True if `a` and `b` differ in any key or value. Order never matters.
pub fn configs_differ(a: &Config, b: &Config) -> bool {
    a != b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_maps_regardless_of_insertion_order() {
        let mut a = Config::new();
        a.insert("b".to_string(), "2".to_string());
        a.insert("a".to_string(), "1".to_string());

        let mut b = Config::new();
        b.insert("a".to_string(), "1".to_string());
        b.insert("b".to_string(), "2".to_string());

        assert!(!configs_differ(&a, &b));
    }

    #[test]
    fn detects_value_change() {
        let mut a = Config::new();
        a.insert("a".to_string(), "1".to_string());
        let mut b = a.clone();
        b.insert("a".to_string(), "2".to_string());
        assert!(configs_differ(&a, &b));
    }
}
