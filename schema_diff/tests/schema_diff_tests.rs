//! Integration tests for SchemaDiff
//!
//! These run the whole pipeline from definition text to rendered statements.

use std::fs;

use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::tempdir;

use schema_diff::config::{self, Config};
use schema_diff::schema::apply;
use schema_diff::{
    DefinitionParser, DiffOptions, Error, MigrationGenerator, MigrationOutput, OutputPolicy,
    Schema, SchemaDiff, SchemaDiffClient, SourceKind, TolerancePolicy,
};
use schema_diff::utils::naming::NameFilter;

const SHOP_V1: &str = r#"-- MySQL dump 10.13  Distrib 8.0.36, for Linux (x86_64)
--
-- Host: localhost    Database: shop
-- ------------------------------------------------------
/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
/*!40103 SET TIME_ZONE='+00:00' */;

DROP TABLE IF EXISTS `users`;
CREATE TABLE `users` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `name` varchar(100) COLLATE utf8mb4_unicode_ci NOT NULL,
  `status` tinyint(1) NOT NULL DEFAULT '0',
  `created_at` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB AUTO_INCREMENT=310 DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;

DROP TABLE IF EXISTS `logs`;
CREATE TABLE `logs` (
  `id` bigint(20) unsigned NOT NULL AUTO_INCREMENT,
  `message` text,
  PRIMARY KEY (`id`)
) ENGINE=MyISAM DEFAULT CHARSET=latin1;

DROP TABLE IF EXISTS `orders`;
CREATE TABLE `orders` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `user_id` int(11) NOT NULL,
  `total` decimal(10,2) NOT NULL DEFAULT '0.00',
  `note` varchar(255) DEFAULT NULL,
  PRIMARY KEY (`id`),
  KEY `fk_orders_user` (`user_id`),
  CONSTRAINT `fk_orders_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

/*!50003 SET @saved_sql_mode       = @@sql_mode */ ;
DELIMITER ;;
/*!50003 CREATE*/ /*!50017 DEFINER=`root`@`%`*/ /*!50003 TRIGGER `orders_bi` BEFORE INSERT ON `orders` FOR EACH ROW BEGIN
  IF NEW.total < 0 THEN
    SET NEW.total = 0;
  END IF;
END */;;
DELIMITER ;
/*!50003 SET sql_mode              = @saved_sql_mode */ ;
"#;

const SHOP_V2: &str = r#"
CREATE TABLE `users` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `email` varchar(255) NOT NULL,
  `name` varchar(150) COLLATE utf8mb4_unicode_ci NOT NULL,
  `status` tinyint(1) NOT NULL DEFAULT '1',
  `created_at` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,
  PRIMARY KEY (`id`),
  UNIQUE KEY `uq_users_email` (`email`)
) ENGINE=InnoDB AUTO_INCREMENT=512 DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;

CREATE TABLE `orders` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `note` varchar(255) DEFAULT NULL,
  `user_id` int(11) NOT NULL,
  `total` decimal(12,2) NOT NULL DEFAULT '0.00',
  PRIMARY KEY (`id`),
  KEY `fk_orders_user` (`user_id`),
  CONSTRAINT `fk_orders_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

CREATE TABLE `order_items` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `order_id` int(11) NOT NULL,
  `sku` varchar(32) NOT NULL,
  PRIMARY KEY (`id`),
  KEY `order_id` (`order_id`),
  CONSTRAINT `order_items_ibfk_1` FOREIGN KEY (`order_id`) REFERENCES `orders` (`id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
"#;

fn parse(name: &str, text: &str) -> Schema {
    DefinitionParser::default()
        .parse(name, SourceKind::File, text)
        .expect("definition text should parse")
}

fn diff_with(old: &Schema, new: &Schema, tolerance: TolerancePolicy) -> SchemaDiff {
    let options = DiffOptions {
        tolerance,
        ..Default::default()
    };
    SchemaDiff::generate(old, new, &options).expect("diff should succeed")
}

fn render(diff: &SchemaDiff, policy: &OutputPolicy) -> Vec<String> {
    match MigrationGenerator::new(policy).generate(diff).unwrap() {
        MigrationOutput::Statements(migration) => migration.lines(),
        MigrationOutput::TableList(tables) => panic!("expected statements, got {tables:?}"),
    }
}

fn executable(lines: &[String]) -> Vec<&str> {
    lines
        .iter()
        .map(String::as_str)
        .filter(|line| !line.starts_with("--"))
        .collect()
}

#[rstest]
#[case::strict(TolerancePolicy::strict())]
#[case::tolerant(TolerancePolicy::tolerant())]
#[case::formatting_only(TolerancePolicy { ignore_formatting: true, ..Default::default() })]
fn diff_of_schema_with_itself_is_empty(#[case] tolerance: TolerancePolicy) {
    for text in [SHOP_V1, SHOP_V2] {
        let schema = parse("shop", text);
        assert!(diff_with(&schema, &schema, tolerance).is_empty());
    }
}

#[rstest]
#[case::forward(SHOP_V1, SHOP_V2)]
#[case::backward(SHOP_V2, SHOP_V1)]
#[case::from_nothing("", SHOP_V2)]
#[case::to_nothing(SHOP_V1, "")]
fn applying_a_diff_reaches_the_target(#[case] old_text: &str, #[case] new_text: &str) {
    let old = parse("old", old_text);
    let new = parse("new", new_text);

    let diff = diff_with(&old, &new, TolerancePolicy::strict());
    let applied = apply(&old, &diff).expect("diff should apply to its own source");

    let rest = diff_with(&applied, &new, TolerancePolicy::strict());
    assert!(rest.is_empty(), "left over:\n{rest}");
}

#[test]
fn existence_deltas_are_symmetric() {
    let v1 = parse("v1", SHOP_V1);
    let v2 = parse("v2", SHOP_V2);

    let forward = diff_with(&v1, &v2, TolerancePolicy::strict());
    let backward = diff_with(&v2, &v1, TolerancePolicy::strict());

    let added = |diff: &SchemaDiff| -> Vec<String> {
        diff.deltas
            .iter()
            .filter(|d| matches!(d, schema_diff::DeltaRecord::TableAdded(_)))
            .map(|d| d.table_name().to_string())
            .collect()
    };
    let removed = |diff: &SchemaDiff| -> Vec<String> {
        diff.deltas
            .iter()
            .filter(|d| matches!(d, schema_diff::DeltaRecord::TableRemoved(_)))
            .map(|d| d.table_name().to_string())
            .collect()
    };

    assert_eq!(added(&forward), vec!["order_items"]);
    assert_eq!(removed(&forward), vec!["logs"]);
    assert_eq!(added(&forward), removed(&backward));
    assert_eq!(removed(&forward), added(&backward));
}

#[rstest]
#[case::defaults(TolerancePolicy { ignore_default: true, ..Default::default() })]
#[case::auto_increment(TolerancePolicy { ignore_auto_increment: true, ..Default::default() })]
#[case::collation(TolerancePolicy { ignore_collation: true, ..Default::default() })]
#[case::formatting(TolerancePolicy { ignore_formatting: true, ..Default::default() })]
#[case::everything(TolerancePolicy::tolerant())]
fn relaxing_the_policy_never_adds_deltas(#[case] relaxed: TolerancePolicy) {
    let v1 = parse("v1", SHOP_V1);
    let v2 = parse("v2", SHOP_V2);

    let strict = diff_with(&v1, &v2, TolerancePolicy::strict());
    let loose = diff_with(&v1, &v2, relaxed);
    assert!(loose.change_count() <= strict.change_count());
}

#[test]
fn ignored_classes_hide_cosmetic_differences() {
    let old = parse(
        "old",
        "CREATE TABLE `t` (`n` INT(11) DEFAULT '0' COLLATE utf8_bin) ENGINE=InnoDB AUTO_INCREMENT=3",
    );
    let new = parse(
        "new",
        "CREATE TABLE `t` (`n` int DEFAULT 0) ENGINE=innodb AUTO_INCREMENT=99",
    );

    assert_eq!(diff_with(&old, &new, TolerancePolicy::strict()).change_count(), 3);
    assert!(diff_with(&old, &new, TolerancePolicy::tolerant()).is_empty());
}

#[test]
fn rendering_is_deterministic() {
    let client = SchemaDiffClient::new(Config::default());
    let first = client.compare(SHOP_V1, SHOP_V2).unwrap().to_script();
    for _ in 0..5 {
        assert_eq!(client.compare(SHOP_V1, SHOP_V2).unwrap().to_script(), first);
    }
}

#[test]
fn new_column_is_added_before_its_index() {
    let old = parse(
        "old",
        "CREATE TABLE `users` (\n  `id` int NOT NULL AUTO_INCREMENT,\n  `name` varchar(100) NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB;",
    );
    let new = parse(
        "new",
        "CREATE TABLE `users` (\n  `id` int NOT NULL AUTO_INCREMENT,\n  `name` varchar(100) NOT NULL,\n  `email` varchar(255) NOT NULL,\n  PRIMARY KEY (`id`),\n  KEY `idx_email` (`email`)\n) ENGINE=InnoDB;",
    );

    let diff = diff_with(&old, &new, TolerancePolicy::strict());
    let output = MigrationGenerator::new(&OutputPolicy::default())
        .generate(&diff)
        .unwrap();

    assert_eq!(
        output.to_script(),
        "-- schema_diff: old -> new\n\
         ALTER TABLE `users` ADD COLUMN `email` varchar(255) NOT NULL AFTER `name`;\n\
         ALTER TABLE `users` ADD KEY `idx_email` (`email`);\n"
    );
}

#[rstest]
#[case::suppressed(true)]
#[case::emitted(false)]
fn dropped_table_honors_suppression(#[case] suppress: bool) {
    let old = parse("old", SHOP_V1);
    let mut new = old.clone();
    new.name = "new".to_string();
    new.tables.remove("logs");

    let diff = diff_with(&old, &new, TolerancePolicy::strict());
    let policy = OutputPolicy {
        suppress_drop_tables: suppress,
        ..Default::default()
    };
    let lines = render(&diff, &policy);

    if suppress {
        assert_eq!(
            lines,
            vec!["-- schema_diff: old -> new", "-- skipped: DROP TABLE `logs`"]
        );
    } else {
        assert_eq!(executable(&lines), vec!["DROP TABLE `logs`;"]);
        assert!(lines[1].starts_with("-- was: CREATE TABLE `logs` (\n--   `id` bigint(20) unsigned"));
    }
}

#[test]
fn reordered_columns_are_moved_in_place() {
    let old = parse("old", "CREATE TABLE `t` (`a` int, `b` int, `c` int);");
    let new = parse("new", "CREATE TABLE `t` (`a` int, `c` int, `b` int);");

    let diff = diff_with(&old, &new, TolerancePolicy::strict());
    let lines = render(&diff, &OutputPolicy::default());

    assert_eq!(
        executable(&lines),
        vec![
            "ALTER TABLE `t` MODIFY COLUMN `c` int AFTER `a`;",
            "ALTER TABLE `t` MODIFY COLUMN `b` int AFTER `c`;",
        ]
    );
}

#[test]
fn added_column_among_moved_columns_lands_in_place() {
    let old = parse("old", "CREATE TABLE `t` (`a` int, `b` int, `c` int);");
    let new = parse("new", "CREATE TABLE `t` (`c` int, `x` int, `a` int, `b` int);");

    let diff = diff_with(&old, &new, TolerancePolicy::strict());
    assert_eq!(
        executable(&render(&diff, &OutputPolicy::default())),
        vec![
            "ALTER TABLE `t` MODIFY COLUMN `c` int FIRST;",
            "ALTER TABLE `t` ADD COLUMN `x` int AFTER `c`;",
            "ALTER TABLE `t` MODIFY COLUMN `a` int AFTER `x`;",
            "ALTER TABLE `t` MODIFY COLUMN `b` int AFTER `a`;",
        ]
    );
}

#[rstest]
#[case::added(
    "CREATE TABLE `t` (`name` varchar(20));",
    "CREATE TABLE `t` (`id` int NOT NULL AUTO_INCREMENT, `name` varchar(20), PRIMARY KEY (`id`));",
    "ALTER TABLE `t` ADD COLUMN `id` int NOT NULL AUTO_INCREMENT FIRST, ADD PRIMARY KEY (`id`);"
)]
#[case::dropped(
    "CREATE TABLE `t` (`id` int NOT NULL AUTO_INCREMENT, `name` varchar(20), PRIMARY KEY (`id`));",
    "CREATE TABLE `t` (`name` varchar(20));",
    "ALTER TABLE `t` DROP COLUMN `id`, DROP PRIMARY KEY;"
)]
#[case::gained(
    "CREATE TABLE `t` (`id` int NOT NULL, `name` varchar(20));",
    "CREATE TABLE `t` (`id` int NOT NULL AUTO_INCREMENT, `name` varchar(20), PRIMARY KEY (`id`));",
    "ALTER TABLE `t` MODIFY COLUMN `id` int NOT NULL AUTO_INCREMENT, ADD PRIMARY KEY (`id`);"
)]
#[case::lost(
    "CREATE TABLE `t` (`id` int NOT NULL AUTO_INCREMENT, `name` varchar(20), PRIMARY KEY (`id`));",
    "CREATE TABLE `t` (`id` int NOT NULL, `name` varchar(20));",
    "ALTER TABLE `t` MODIFY COLUMN `id` int NOT NULL, DROP PRIMARY KEY;"
)]
#[case::rekeyed(
    "CREATE TABLE `t` (`id` int NOT NULL AUTO_INCREMENT, `x` int NOT NULL, PRIMARY KEY (`id`));",
    "CREATE TABLE `t` (`id` int NOT NULL AUTO_INCREMENT, `x` int NOT NULL, PRIMARY KEY (`id`,`x`));",
    "ALTER TABLE `t` DROP PRIMARY KEY, ADD PRIMARY KEY (`id`, `x`);"
)]
fn auto_increment_key_changes_share_one_statement(
    #[case] old_text: &str,
    #[case] new_text: &str,
    #[case] expected: &str,
) {
    let diff = diff_with(&parse("old", old_text), &parse("new", new_text), TolerancePolicy::strict());
    assert_eq!(executable(&render(&diff, &OutputPolicy::default())), vec![expected]);
}

#[rstest]
#[case::enum_values("`s` enum('Active','Inactive')", "`s` enum('active','inactive')")]
#[case::set_values("`s` set('Read','Write')", "`s` set('read','write')")]
#[case::generated_literal(
    "`a` varchar(10), `s` varchar(20) GENERATED ALWAYS AS (concat(`a`,'X')) VIRTUAL",
    "`a` varchar(10), `s` varchar(20) GENERATED ALWAYS AS (concat(`a`,'x')) VIRTUAL"
)]
fn literal_case_changes_survive_formatting_tolerance(
    #[case] old_columns: &str,
    #[case] new_columns: &str,
) {
    let old = parse("old", &format!("CREATE TABLE `t` ({});", old_columns));
    let new = parse("new", &format!("CREATE TABLE `t` ({});", new_columns));
    let formatting = TolerancePolicy {
        ignore_formatting: true,
        ..Default::default()
    };

    assert_eq!(diff_with(&old, &new, formatting).change_count(), 1);
}

#[test]
fn keyword_case_is_formatting() {
    let old = parse("old", "CREATE TABLE `t` (`s` ENUM('Active','Inactive') NOT NULL);");
    let new = parse("new", "CREATE TABLE `t` (`s` enum('Active','Inactive') NOT NULL);");
    let formatting = TolerancePolicy {
        ignore_formatting: true,
        ..Default::default()
    };

    assert_eq!(diff_with(&old, &new, TolerancePolicy::strict()).change_count(), 1);
    assert!(diff_with(&old, &new, formatting).is_empty());
}

#[test]
fn table_filter_limits_the_comparison() {
    let old = parse(
        "old",
        "CREATE TABLE users (id int);\nCREATE TABLE user_roles (id int);\nCREATE TABLE orders (id int);",
    );
    let new = parse(
        "new",
        "CREATE TABLE users (id int, x int);\nCREATE TABLE user_roles (id int, x int);\nCREATE TABLE orders (id int, x int);\nCREATE TABLE user_log (id int);",
    );

    let options = DiffOptions {
        table_filter: Some(NameFilter::new("^user").unwrap()),
        ..Default::default()
    };
    let diff = SchemaDiff::generate(&old, &new, &options).unwrap();
    assert_eq!(diff.touched_tables(), vec!["user_log", "user_roles", "users"]);

    // the generator filter applies on its own
    let unfiltered = diff_with(&old, &new, TolerancePolicy::strict());
    let policy = OutputPolicy {
        table_filter: Some(NameFilter::new("^user").unwrap()),
        list_only: true,
        ..Default::default()
    };
    assert_eq!(
        MigrationGenerator::new(&policy).generate(&unfiltered).unwrap(),
        MigrationOutput::TableList(vec![
            "user_log".to_string(),
            "user_roles".to_string(),
            "users".to_string(),
        ])
    );
}

#[test]
fn full_migration_is_dependency_ordered() {
    let old = parse("v1", SHOP_V1);
    let new = parse("v2", SHOP_V2);
    let diff = diff_with(&old, &new, TolerancePolicy::strict());
    let policy = OutputPolicy {
        suppress_old_definitions: true,
        ..Default::default()
    };
    let lines = render(&diff, &policy);
    let position = |needle: &str| {
        lines
            .iter()
            .position(|line| line.contains(needle))
            .unwrap_or_else(|| panic!("missing {needle} in {lines:#?}"))
    };

    // foreign key and trigger drops come first
    assert!(position("DROP FOREIGN KEY `fk_orders_user`") < position("CREATE TABLE `order_items`"));
    assert!(position("DROP TRIGGER IF EXISTS `orders_bi`") < position("CREATE TABLE `order_items`"));
    // order_items references a changed table, so its key waits for phase 4
    assert!(!lines[position("CREATE TABLE `order_items`")].contains("CONSTRAINT"));
    assert!(position("ADD COLUMN `email`") < position("ADD UNIQUE KEY `uq_users_email`"));
    assert!(position("MODIFY COLUMN `note`") < position("ADD CONSTRAINT `fk_orders_user`"));
    assert!(position("ADD CONSTRAINT `fk_orders_user`") < position("ADD CONSTRAINT `order_items_ibfk_1`"));
    assert!(lines.last().unwrap().starts_with("DROP TABLE `logs`"));
}

#[test]
fn diff_serializes_to_json() {
    let diff = diff_with(&parse("v1", SHOP_V1), &parse("v2", SHOP_V2), TolerancePolicy::strict());
    let json: serde_json::Value = serde_json::from_str(&diff.to_json().unwrap()).unwrap();

    assert_eq!(json["old_schema"], "v1");
    assert_eq!(json["deltas"][0]["table_removed"]["name"], "logs");
    assert_eq!(json["deltas"][1]["table_added"]["name"], "order_items");
}

#[test]
fn parse_errors_carry_line_numbers() {
    let text = "SET NAMES utf8mb4;\n\nCREATE TABLE `ok` (`id` int);\n\nCREATE TABLE `broken` (\n  `id` int NOT NULL,\n  `x` frobnicate zap\n);";
    let client = SchemaDiffClient::new(Config::default());

    match client.parse_schema("bad", SourceKind::File, text) {
        Err(Error::ParseError { line, statement, .. }) => {
            assert_eq!(line, 5);
            assert!(statement.starts_with("CREATE TABLE `broken`"));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn unsupported_constructs_fail_unless_skipped() {
    let text = "CREATE TABLE `t` (`id` int);\nCREATE VIEW `v` AS SELECT `id` FROM `t`;";

    let strict = SchemaDiffClient::new(Config::default());
    assert!(matches!(
        strict.parse_schema("s", SourceKind::File, text),
        Err(Error::UnsupportedConstruct { line: 2, .. })
    ));

    let config = config::from_toml_str("[parser]\nskip_unsupported = true\n").unwrap();
    let lenient = SchemaDiffClient::new(config);
    let schema = lenient.parse_schema("s", SourceKind::File, text).unwrap();
    assert_eq!(schema.tables.len(), 1);
}

#[test]
fn client_uses_configuration_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schema_diff.toml");
    fs::write(
        &path,
        r#"
[tolerance]
ignore_auto_increment = true

[diff]
table_filter = "^(users|logs)$"

[output]
suppress_drop_tables = true
suppress_old_definitions = true
include_header = false
"#,
    )
    .unwrap();

    let client = schema_diff::init(path.to_str().unwrap()).unwrap();
    assert!(client.config().tolerance.ignore_auto_increment);

    let lines = match client.compare(SHOP_V1, SHOP_V2).unwrap() {
        MigrationOutput::Statements(migration) => migration.lines(),
        MigrationOutput::TableList(_) => panic!("expected statements"),
    };
    assert_eq!(
        lines,
        vec![
            "ALTER TABLE `users` ADD COLUMN `email` varchar(255) NOT NULL AFTER `id`;",
            "ALTER TABLE `users` MODIFY COLUMN `name` varchar(150) COLLATE utf8mb4_unicode_ci NOT NULL;",
            "ALTER TABLE `users` MODIFY COLUMN `status` tinyint(1) NOT NULL DEFAULT '1';",
            "ALTER TABLE `users` ADD UNIQUE KEY `uq_users_email` (`email`);",
            "-- skipped: DROP TABLE `logs`",
        ]
    );
}

#[test]
fn invalid_configuration_is_reported() {
    assert!(matches!(
        config::from_toml_str("[output]\nlist_only = \"yes\"\n"),
        Err(Error::ConfigError(_))
    ));

    let config = config::from_toml_str("[diff]\ntable_filter = \"(unclosed\"\n").unwrap();
    assert!(matches!(
        config.diff_options(),
        Err(Error::InvalidPattern { .. })
    ));
    assert!(matches!(
        config::load_from_file("/nonexistent/schema_diff.toml"),
        Err(Error::ConfigError(_))
    ));
}
