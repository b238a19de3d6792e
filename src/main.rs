// ==========================================
// 供应商价格导入 - 命令行入口
// ==========================================
// 用法:
//   supplier-price-import formats
//   supplier-price-import preview <file> [rows]
//   supplier-price-import recalc <purchase|retail> [limit]
//
// 数据库路径: SUPPLIER_PRICE_IMPORT_DB_PATH 或用户数据目录
// ==========================================

use anyhow::{anyhow, bail, Context};
use std::path::Path;
use std::sync::{Arc, Mutex};
use supplier_price_import::config::{ConfigManager, PriceImportConfigReader};
use supplier_price_import::db::{default_db_path, init_schema, open_sqlite_connection};
use supplier_price_import::importer::PreviewOptions;
use supplier_price_import::repository::{
    LocalFileStorage, SqliteCatalogRepository, SqliteTemplateRepository,
};
use supplier_price_import::{logging, ParserRegistry, PriceRole, PriceUpdateApi};

const USAGE: &str = "用法: supplier-price-import <formats | preview <file> [rows] | recalc <purchase|retail> [limit]>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    tracing::info!(version = supplier_price_import::VERSION, "{}", supplier_price_import::APP_NAME);

    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;

    match command.as_str() {
        "formats" => {
            let formats = ParserRegistry::with_defaults().supported_formats();
            println!("{}", serde_json::to_string_pretty(&formats)?);
        }
        "preview" => {
            let file = args.next().ok_or_else(|| anyhow!(USAGE))?;
            let rows = match args.next() {
                Some(v) => v.parse::<usize>().context("rows 必须是正整数")?,
                None => 20,
            };
            let bytes = std::fs::read(&file).with_context(|| format!("无法读取文件: {}", file))?;
            let file_name = Path::new(&file)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.clone());
            let options = PreviewOptions {
                row_limit: rows,
                ..PreviewOptions::default()
            };
            let preview = ParserRegistry::with_defaults().preview(&file_name, &bytes, &options)?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        "recalc" => {
            let role = match args.next().as_deref() {
                Some("purchase") => PriceRole::Purchase,
                Some("retail") => PriceRole::Retail,
                _ => bail!(USAGE),
            };
            let limit = match args.next() {
                Some(v) => Some(v.parse::<usize>().context("limit 必须是正整数")?),
                None => None,
            };

            let db_path = default_db_path();
            tracing::info!(db_path = %db_path, "使用数据库");
            let conn = open_sqlite_connection(&db_path)?;
            init_schema(&conn)?;
            let conn = Arc::new(Mutex::new(conn));

            let config = ConfigManager::from_connection(Arc::clone(&conn))
                .map_err(|e| anyhow!("配置初始化失败: {}", e))?;
            let config: Arc<dyn PriceImportConfigReader> = Arc::new(config);
            let api = PriceUpdateApi::new(
                Arc::new(SqliteTemplateRepository::new(Arc::clone(&conn))),
                Arc::new(SqliteCatalogRepository::new(Arc::clone(&conn))),
                Arc::new(LocalFileStorage::new(".")),
                config,
            );

            let stats = api
                .recalculate_prices(role, limit)
                .await
                .map_err(|e| anyhow!(serde_json::to_string(&e.payload()).unwrap_or_else(|_| e.to_string())))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
