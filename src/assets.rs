//! Embedded SQL migrations, bundled into the binary so the crate has no
//! runtime dependency on a `migrations/` directory existing next to it.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "migrations/"]
struct Migrations;

pub struct MigrationAssets;

impl MigrationAssets {
    /// Returns (filename, contents) pairs sorted by filename, so the numeric
    /// prefix on each migration file determines apply order.
    pub fn get_migrations() -> Vec<(String, String)> {
        let mut files: Vec<String> = Migrations::iter().map(|f| f.to_string()).collect();
        files.sort();

        files
            .into_iter()
            .filter_map(|name| {
                let contents = Migrations::get(&name)?;
                let sql = String::from_utf8(contents.data.into_owned()).ok()?;
                Some((name, sql))
            })
            .collect()
    }
}
