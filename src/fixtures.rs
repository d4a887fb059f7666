#[cfg(test)]
pub mod test {
    //! Shared test fixtures. Configuration and metadata trees are written as
    //! TOML for readability: top-level tables are sections, string values are
    //! option values, and a `!`/`!!` key prefix marks a user- or
    //! trigger-ignored stored state (sections and options alike).

    use crate::tree::{ConfigTree, MetaTree};
    use crate::types::SettingState;

    fn split_state(key: &str) -> (&str, SettingState) {
        if let Some(rest) = key.strip_prefix("!!") {
            (rest, SettingState::TriggerIgnored)
        } else if let Some(rest) = key.strip_prefix('!') {
            (rest, SettingState::UserIgnored)
        } else {
            (key, SettingState::Enabled)
        }
    }

    fn scalar_to_string(value: &toml::Value) -> String {
        match value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            other => panic!("unsupported fixture value: {other:?}"),
        }
    }

    pub fn config_from_toml(text: &str) -> ConfigTree {
        let table: toml::Table = text.parse().expect("fixture config parses");
        let mut config = ConfigTree::new();
        for (key, value) in &table {
            match value {
                toml::Value::Table(options) => {
                    let (section, state) = split_state(key);
                    config.add_section(section);
                    config.set_section_state(section, state);
                    for (opt_key, opt_value) in options {
                        let (option, opt_state) = split_state(opt_key);
                        config.set_value(section, option, &scalar_to_string(opt_value));
                        config.set_option_state(section, option, opt_state);
                    }
                }
                scalar => {
                    let (option, state) = split_state(key);
                    config.set_value("", option, &scalar_to_string(scalar));
                    config.set_option_state("", option, state);
                }
            }
        }
        config
    }

    pub fn meta_from_toml(text: &str) -> MetaTree {
        let table: toml::Table = text.parse().expect("fixture metadata parses");
        let mut meta = MetaTree::new();
        for (id, value) in &table {
            let toml::Value::Table(props) = value else {
                panic!("metadata fixture entries must be tables: {id}");
            };
            for (name, prop_value) in props {
                meta.set(id, name, &scalar_to_string(prop_value));
            }
        }
        meta
    }

    /// A small untriggered configuration: one section with two options.
    pub fn basic_pair() -> (ConfigTree, MetaTree) {
        let config = config_from_toml(
            r#"
            ["namelist:foo"]
            switch = "enabled"
            bar = "5"
            "#,
        );
        let meta = meta_from_toml(
            r#"
            ["namelist:foo=switch"]
            values = "enabled, disabled"
            ["namelist:foo=bar"]
            type = "integer"
            "#,
        );
        (config, meta)
    }

    /// The single-trigger scenario: `switch` controls `bar`, which is
    /// enabled only while `switch` is `enabled`.
    pub fn trigger_pair(switch_value: &str) -> (ConfigTree, MetaTree) {
        let config = config_from_toml(&format!(
            r#"
            ["namelist:foo"]
            switch = "{switch_value}"
            bar = "5"
            "#
        ));
        let meta = meta_from_toml(
            r#"
            ["namelist:foo=switch"]
            trigger = "namelist:foo=bar: enabled"
            values = "enabled, disabled"
            ["namelist:foo=bar"]
            type = "integer"
            "#,
        );
        (config, meta)
    }

    /// A two-hop chain: `first` controls `second`, `second` controls
    /// `third`; both links require the value `on`.
    pub fn chain_pair(first_value: &str) -> (ConfigTree, MetaTree) {
        let config = config_from_toml(&format!(
            r#"
            [a]
            first = "{first_value}"
            second = "on"
            third = "1"
            "#
        ));
        let meta = meta_from_toml(
            r#"
            ["a=first"]
            trigger = "a=second: on"
            ["a=second"]
            trigger = "a=third: on"
            ["a=third"]
            type = "integer"
            "#,
        );
        (config, meta)
    }

    /// A duplicated section with two instances: the trigger is declared
    /// against the bare template; instance (1) satisfies it, instance (2)
    /// does not. The `extra` option exists only in metadata.
    pub fn duplicate_pair() -> (ConfigTree, MetaTree) {
        let config = config_from_toml(
            r#"
            ["namelist:dup(1)"]
            switch = "enabled"
            bar = "1"
            ["namelist:dup(2)"]
            switch = "disabled"
            bar = "2"
            "#,
        );
        let meta = meta_from_toml(
            r#"
            ["namelist:dup"]
            duplicate = "true"
            ["namelist:dup=switch"]
            trigger = "namelist:dup=bar: enabled"
            ["namelist:dup=bar"]
            type = "integer"
            ["namelist:dup=extra"]
            type = "integer"
            "#,
        );
        (config, meta)
    }

    /// A trigger whose target is a whole section.
    pub fn section_trigger_pair(mode_value: &str) -> (ConfigTree, MetaTree) {
        let config = config_from_toml(&format!(
            r#"
            [control]
            mode = "{mode_value}"
            ["namelist:extra"]
            opt = "1"
            "#
        ));
        let meta = meta_from_toml(
            r#"
            ["control=mode"]
            trigger = "namelist:extra: on"
            ["namelist:extra"]
            title = "Extra settings"
            ["namelist:extra=opt"]
            type = "integer"
            "#,
        );
        (config, meta)
    }

    #[test]
    fn state_prefixes_parse() {
        let config = config_from_toml(
            r#"
            ["!namelist:user_off"]
            a = "1"
            ["namelist:on"]
            "!b" = "2"
            "!!c" = "3"
            "#,
        );
        assert_eq!(
            config.state(&crate::ident::SettingId::parse("namelist:user_off")),
            Some(SettingState::UserIgnored)
        );
        assert_eq!(
            config.state(&crate::ident::SettingId::parse("namelist:on=b")),
            Some(SettingState::UserIgnored)
        );
        assert_eq!(
            config.state(&crate::ident::SettingId::parse("namelist:on=c")),
            Some(SettingState::TriggerIgnored)
        );
    }

    #[test]
    fn fixtures_are_well_formed() {
        for (config, meta) in [
            basic_pair(),
            trigger_pair("enabled"),
            chain_pair("on"),
            duplicate_pair(),
            section_trigger_pair("on"),
        ] {
            assert!(config.sections().count() > 0);
            assert!(meta.ids().count() > 0);
        }
    }
}
