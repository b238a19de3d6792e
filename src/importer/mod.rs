// ==========================================
// 供应商价格导入 - 导入层
// ==========================================
// 职责: 供应商价格表读取与单元格规范化
// 支持: Excel, CSV；图片/PDF 预留
// ==========================================

pub mod error;
pub mod file_parser;
pub mod normalizer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{
    AiParser, CsvParser, ExcelParser, FormatInfo, ParserRegistry, PreviewOptions,
    PriceListParser,
};
pub use normalizer::{normalize_code, normalize_price, normalize_text, tokenize};
