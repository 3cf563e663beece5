use std::fs;
use std::path::Path;

use entidesc::{
    Change, DdlOptions, DescriptorLoader, EntityDescriptor, MemoryAdapter, MySqlQuoting, TablePlan, create_table_sql,
    incremental_changes, plan_table,
};
use tempfile::TempDir;

fn declare(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(format!("{name}.toml")), source).unwrap();
}

fn loader(dir: &Path) -> DescriptorLoader {
    DescriptorLoader::new(dir).always_reload(true)
}

async fn migrate(descriptor: &EntityDescriptor, adapter: &MemoryAdapter) -> TablePlan {
    let plan = plan_table(descriptor, adapter).await.unwrap();
    adapter.apply(&plan).unwrap();
    plan
}

#[tokio::test]
async fn declaration_evolves_through_incremental_migrations() {
    let dir = TempDir::new().unwrap();
    let adapter = MemoryAdapter::new();
    let options = DdlOptions::default();

    declare(
        dir.path(),
        "user",
        "[fields]\nname = \"string(50)\"\nnickname = \"string(20)\"\n",
    );
    let first = loader(dir.path()).load("user").unwrap();
    assert!(matches!(migrate(&first, &adapter).await, TablePlan::Create(_)));
    assert_eq!(incremental_changes(&first, &adapter, &options).await.unwrap(), None);

    declare(
        dir.path(),
        "user",
        "indexes = [\"UNIQUE(email)\"]\n\n[fields]\nname = \"string(50)\"\nage = \"integer(0, 150)\"\nemail = \"email\"\n",
    );
    let second = loader(dir.path()).load("user").unwrap();
    let sql = incremental_changes(&second, &adapter, &options).await.unwrap().unwrap();
    assert_eq!(
        sql,
        "ALTER TABLE `user`\n\
         \tDROP COLUMN `nickname`,\n\
         \tADD COLUMN `age` TINYINT(3) UNSIGNED NOT NULL,\n\
         \tADD COLUMN `email` VARCHAR(100) NOT NULL,\n\
         \tADD UNIQUE (`email`);"
    );

    migrate(&second, &adapter).await;
    assert_eq!(incremental_changes(&second, &adapter, &options).await.unwrap(), None);
}

#[tokio::test]
async fn created_table_diffs_clean() {
    let dir = TempDir::new().unwrap();
    declare(
        dir.path(),
        "article",
        "indexes = [\"FULLTEXT(title, body)\", \"INDEX(published)=by_date\"]\n\n\
         [fields]\ntitle = \"string(200)\"\nbody = \"string(100000)\"\nrating = \"float(1)\"\n\
         published = \"datetime[nullable]\"\nviews = \"natural\"\n",
    );
    let article = loader(dir.path()).load("article").unwrap();
    let adapter = MemoryAdapter::new();

    migrate(&article, &adapter).await;
    assert!(adapter.has_table("article"));
    assert!(plan_table(&article, &adapter).await.unwrap().is_unchanged());
}

#[tokio::test]
async fn missing_table_yields_create_statement() {
    let dir = TempDir::new().unwrap();
    declare(dir.path(), "tag", "[fields]\nlabel = \"string(30)\"\n");
    let tag = loader(dir.path()).load("tag").unwrap();
    let options = DdlOptions {
        engine: "InnoDB".to_string(),
        charset: "utf8mb4".to_string(),
    };

    let incremental = incremental_changes(&tag, &MemoryAdapter::new(), &options)
        .await
        .unwrap()
        .unwrap();
    let offline = create_table_sql(&tag, &MySqlQuoting, &options).unwrap();

    assert_eq!(incremental, offline);
    assert_eq!(
        offline,
        "CREATE TABLE IF NOT EXISTS `tag` (\n\
         \t`id` INT(10) UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,\n\
         \t`label` VARCHAR(30) NOT NULL\n\
         ) ENGINE=InnoDB CHARACTER SET utf8mb4;"
    );
}

#[tokio::test]
async fn widening_a_number_crosses_affinities() {
    let dir = TempDir::new().unwrap();
    let adapter = MemoryAdapter::new();

    declare(dir.path(), "stock", "[fields]\nquantity = \"integer(0, 100)\"\n");
    migrate(&loader(dir.path()).load("stock").unwrap(), &adapter).await;

    declare(dir.path(), "stock", "[fields]\nquantity = \"integer(0, 40000)\"\n");
    let widened = loader(dir.path()).load("stock").unwrap();
    let TablePlan::Alter(alter) = plan_table(&widened, &adapter).await.unwrap() else {
        panic!("expected an alter plan");
    };

    assert_eq!(alter.changes.len(), 1);
    let Change::ChangeColumn { column, current, .. } = &alter.changes[0] else {
        panic!("expected a column change");
    };
    assert_eq!(current.column_type, "TINYINT(3) UNSIGNED");
    assert_eq!(column.column_type, "SMALLINT(5) UNSIGNED");
}

#[tokio::test]
async fn abstract_parent_never_gets_a_table() {
    let dir = TempDir::new().unwrap();
    declare(
        dir.path(),
        "stamped",
        "flags = [\"abstract\"]\n\n[fields]\ncreated_at = \"datetime\"\n",
    );
    declare(dir.path(), "comment", "parent = \"stamped\"\n\n[fields]\ntext = \"string(500)\"\n");
    let adapter = MemoryAdapter::new();
    let options = DdlOptions::default();

    let mut statements = Vec::new();
    for descriptor in loader(dir.path()).load_all().unwrap() {
        if let Some(sql) = incremental_changes(&descriptor, &adapter, &options).await.unwrap() {
            statements.push(sql);
        }
    }

    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS `comment`"));
    assert!(statements[0].contains("`created_at` DATETIME NOT NULL"));
    assert!(statements[0].contains("`text` TEXT NOT NULL"));
}
