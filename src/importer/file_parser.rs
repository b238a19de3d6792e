// ==========================================
// 供应商价格导入 - 文件解析器实现
// ==========================================
// 支持: CSV/TSV (.csv/.tsv/.txt) / Excel (.xlsx/.xlsm/.xls/.ods)
// 预留: 图片 / PDF（AiParser，未实现）
// 约束: 逐行回调读取，不先构造整表再处理
// ==========================================

use crate::domain::row::{NormalizedRow, PreviewResult, PreviewRow, RowDiagnostic};
use crate::domain::template::{ColumnMapping, ResolvedMapping};
use crate::domain::types::{PriceSlot, SourceFormat};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::normalizer::{clean_cell, normalize_price};
use calamine::{open_workbook_auto_from_rs, DataRef, Reader, Xlsx};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, warn};

/// 行回调: (0 起始行下标, 原始单元格) → 是否继续
pub type RowVisitor<'a> = dyn FnMut(usize, Vec<String>) -> ControlFlow<()> + 'a;

/// 预览参数
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub row_limit: usize,
    /// 自动识别首个数据行时扫描的行数
    pub scan_rows: usize,
    pub mapping: Option<ColumnMapping>,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            row_limit: 20,
            scan_rows: 20,
            mapping: None,
        }
    }
}

/// 已注册格式说明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub name: String,
    pub format: SourceFormat,
    pub extensions: Vec<String>,
    pub implemented: bool,
}

// ==========================================
// PriceListParser Trait
// ==========================================
pub trait PriceListParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn format(&self) -> SourceFormat;

    fn extensions(&self) -> &'static [&'static str];

    fn implemented(&self) -> bool {
        true
    }

    /// 按扩展名判断
    fn supports(&self, file_name: &str) -> bool {
        let ext = file_extension(file_name);
        self.extensions().iter().any(|e| *e == ext)
    }

    /// 按文件头判断（扩展名无法识别时使用）
    fn sniff(&self, _head: &[u8]) -> bool {
        false
    }

    /// 逐行读取原始单元格
    fn read_rows(&self, bytes: &[u8], visit: &mut RowVisitor<'_>) -> ImportResult<()>;

    /// 预览前 N 行，并建议首个数据行
    fn preview(&self, bytes: &[u8], options: &PreviewOptions) -> ImportResult<PreviewResult> {
        let resolved = options.mapping.as_ref().and_then(|m| m.resolve().ok());
        let wanted = options.row_limit.max(options.scan_rows);

        let mut header_guess: Option<Vec<String>> = None;
        let mut sample_rows = Vec::new();
        let mut suggested_start_row = None;
        let mut seen = 0usize;

        self.read_rows(bytes, &mut |index, cells| {
            let cells: Vec<String> = cells.iter().map(|c| clean_cell(c)).collect();
            if cells.iter().all(|c| c.is_empty()) {
                return ControlFlow::Continue(());
            }

            if header_guess.is_none() {
                header_guess = Some(cells.clone());
            }
            if suggested_start_row.is_none()
                && index < options.scan_rows
                && looks_like_data_row(&cells, resolved.as_ref())
            {
                suggested_start_row = Some(index + 1);
            }
            if sample_rows.len() < options.row_limit {
                sample_rows.push(PreviewRow {
                    row_number: index + 1,
                    cells,
                });
            }

            seen += 1;
            if seen >= wanted && index + 1 >= options.scan_rows {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        Ok(PreviewResult {
            format: self.format(),
            header_guess: header_guess.unwrap_or_default(),
            sample_rows,
            suggested_start_row,
        })
    }

    /// 按列映射解析为规范化行
    fn parse(&self, bytes: &[u8], mapping: &ColumnMapping) -> ImportResult<Vec<NormalizedRow>> {
        let resolved = mapping.resolve().map_err(ImportError::MissingMapping)?;

        let mut rows = Vec::new();
        let mut skipped_blank = 0usize;
        self.read_rows(bytes, &mut |index, cells| {
            if index < resolved.first_row_index {
                return ControlFlow::Continue(());
            }
            match normalize_row(index, &cells, &resolved) {
                Some(row) => rows.push(row),
                None => skipped_blank += 1,
            }
            ControlFlow::Continue(())
        })?;

        debug!(
            parser = self.name(),
            rows = rows.len(),
            skipped_blank = skipped_blank,
            "价格表解析完成"
        );
        Ok(rows)
    }
}

/// 单行规范化；编码与名称均为空时返回 None（空白分隔行）
pub fn normalize_row(
    index: usize,
    cells: &[String],
    mapping: &ResolvedMapping,
) -> Option<NormalizedRow> {
    let cell = |col: Option<usize>| -> String {
        col.and_then(|c| cells.get(c))
            .map(|v| clean_cell(v))
            .unwrap_or_default()
    };

    let code = cell(mapping.code);
    let name = cell(mapping.name);
    if code.is_empty() && name.is_empty() {
        return None;
    }

    let mut diagnostics = Vec::new();
    let mut price_of = |slot: PriceSlot, col: Option<usize>| {
        let raw = cell(col);
        if raw.is_empty() {
            return None;
        }
        let parsed = normalize_price(&raw);
        if parsed.is_none() {
            diagnostics.push(RowDiagnostic::UnparsablePrice { slot, raw });
        }
        parsed
    };
    let price1 = price_of(PriceSlot::Price1, mapping.price1);
    let price2 = price_of(PriceSlot::Price2, mapping.price2);

    if price1.is_none() && price2.is_none() && diagnostics.is_empty() {
        diagnostics.push(RowDiagnostic::MissingPrice);
    }

    let extra: BTreeMap<String, String> = mapping
        .extra
        .iter()
        .filter_map(|(field, col)| {
            let value = cell(Some(*col));
            (!value.is_empty()).then(|| (field.clone(), value))
        })
        .collect();

    Some(NormalizedRow {
        row_number: index + 1,
        code,
        name,
        price1,
        price2,
        extra,
        diagnostics,
    })
}

/// 判断是否像数据行: 编码/名称非空且价格可解析
fn looks_like_data_row(cells: &[String], mapping: Option<&ResolvedMapping>) -> bool {
    let get = |col: Option<usize>| col.and_then(|c| cells.get(c)).map(String::as_str);

    match mapping {
        Some(m) => {
            let key = get(m.code).or(get(m.name)).unwrap_or("");
            let price = get(m.price1).or(get(m.price2)).unwrap_or("");
            !key.is_empty() && normalize_price(price).is_some()
        }
        None => {
            let non_empty = cells.iter().filter(|c| !c.is_empty()).count();
            let numeric = cells.iter().any(|c| normalize_price(c).is_some());
            let textual = cells
                .iter()
                .any(|c| !c.is_empty() && normalize_price(c).is_none());
            non_empty >= 2 && numeric && textual
        }
    }
}

pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV Parser 实现
// ==========================================
// 分隔符自动识别: 逗号 / 分号 / 制表符
pub struct CsvParser;

const CSV_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];
const DELIMITER_SAMPLE_LINES: usize = 10;

impl CsvParser {
    /// 根据前几行识别分隔符（每行出现次数一致者优先）
    pub fn detect_delimiter(text: &str) -> u8 {
        let lines: Vec<&str> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(DELIMITER_SAMPLE_LINES)
            .collect();
        if lines.is_empty() {
            return b',';
        }

        let mut best = (b',', false, 0usize);
        for delimiter in CSV_DELIMITERS {
            let counts: Vec<usize> = lines
                .iter()
                .map(|l| l.bytes().filter(|b| *b == delimiter).count())
                .collect();
            let total: usize = counts.iter().sum();
            if total == 0 {
                continue;
            }
            let consistent = counts.iter().all(|c| *c == counts[0]);
            let better = match (consistent, best.1) {
                (true, false) => true,
                (false, true) => false,
                _ => total > best.2,
            };
            if better {
                best = (delimiter, consistent, total);
            }
        }
        best.0
    }
}

impl PriceListParser for CsvParser {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::DelimitedText
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv", "tsv", "txt"]
    }

    fn read_rows(&self, bytes: &[u8], visit: &mut RowVisitor<'_>) -> ImportResult<()> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(|e| {
            ImportError::MalformedSource(format!("文件不是 UTF-8 编码: {}", e))
        })?;

        let delimiter = Self::detect_delimiter(text);
        debug!(delimiter = %(delimiter as char).escape_default(), "CSV 分隔符识别");

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        for (counter, result) in reader.records().enumerate() {
            let record = result?;
            let index = record
                .position()
                .map(|p| p.line().saturating_sub(1) as usize)
                .unwrap_or(counter);
            let cells: Vec<String> = record.iter().map(str::to_string).collect();
            if visit(index, cells).is_break() {
                break;
            }
        }
        Ok(())
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
// .xlsx/.xlsm: 单元格流式读取
// .xls/.ods: calamine 通用读取（整表 Range）
pub struct ExcelParser;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0";

impl ExcelParser {
    fn read_xlsx_streaming(
        mut workbook: Xlsx<Cursor<&[u8]>>,
        visit: &mut RowVisitor<'_>,
    ) -> ImportResult<()> {
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::MalformedSource("Excel 文件无工作表".to_string()))?;

        let mut cells = workbook.worksheet_cells_reader(&sheet_name)?;
        let mut current: Option<u32> = None;
        let mut buffer: Vec<String> = Vec::new();

        while let Some(cell) = cells.next_cell()? {
            let (row, col) = cell.get_position();
            if current != Some(row) {
                if let Some(prev) = current {
                    if visit(prev as usize, std::mem::take(&mut buffer)).is_break() {
                        return Ok(());
                    }
                }
                current = Some(row);
            }

            let value = data_ref_to_string(cell.get_value());
            let col = col as usize;
            if buffer.len() <= col {
                buffer.resize(col + 1, String::new());
            }
            buffer[col] = value;
        }

        if let Some(prev) = current {
            let _ = visit(prev as usize, buffer);
        }
        Ok(())
    }

    fn read_any_workbook(bytes: &[u8], visit: &mut RowVisitor<'_>) -> ImportResult<()> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::MalformedSource("Excel 文件无工作表".to_string()))??;

        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        for (offset, row) in range.rows().enumerate() {
            let mut cells = vec![String::new(); start_col as usize];
            cells.extend(row.iter().map(|c| c.to_string()));
            if visit(start_row as usize + offset, cells).is_break() {
                break;
            }
        }
        Ok(())
    }
}

fn data_ref_to_string(value: &DataRef<'_>) -> String {
    match value {
        DataRef::String(s) => s.clone(),
        DataRef::SharedString(s) => s.to_string(),
        DataRef::Float(f) => f.to_string(),
        DataRef::Int(i) => i.to_string(),
        DataRef::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

impl PriceListParser for ExcelParser {
    fn name(&self) -> &'static str {
        "excel"
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Spreadsheet
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xlsx", "xlsm", "xls", "ods"]
    }

    fn sniff(&self, head: &[u8]) -> bool {
        head.starts_with(ZIP_MAGIC) || head.starts_with(OLE_MAGIC)
    }

    fn read_rows(&self, bytes: &[u8], visit: &mut RowVisitor<'_>) -> ImportResult<()> {
        if bytes.starts_with(ZIP_MAGIC) {
            match Xlsx::new(Cursor::new(bytes)) {
                Ok(workbook) => return Self::read_xlsx_streaming(workbook, visit),
                Err(e) => {
                    // zip 但不是 xlsx（如 ods），交给通用读取
                    warn!(error = %e, "非 xlsx 压缩包，改用通用读取");
                }
            }
        }
        Self::read_any_workbook(bytes, visit)
    }
}

// ==========================================
// AiParser - 图片 / PDF 预留扩展点
// ==========================================
pub struct AiParser;

impl PriceListParser for AiParser {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::ImageOrPdf
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pdf", "png", "jpg", "jpeg", "webp"]
    }

    fn implemented(&self) -> bool {
        false
    }

    fn sniff(&self, head: &[u8]) -> bool {
        head.starts_with(b"%PDF") || head.starts_with(b"\x89PNG") || head.starts_with(b"\xFF\xD8\xFF")
    }

    fn read_rows(&self, _bytes: &[u8], _visit: &mut RowVisitor<'_>) -> ImportResult<()> {
        Err(ImportError::NotImplemented(
            "图片/PDF 价格表识别".to_string(),
        ))
    }
}

// ==========================================
// ParserRegistry - 按扩展名 / 文件头选择解析器
// ==========================================
pub struct ParserRegistry {
    parsers: Vec<Box<dyn PriceListParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CsvParser));
        registry.register(Box::new(ExcelParser));
        registry.register(Box::new(AiParser));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn PriceListParser>) {
        self.parsers.push(parser);
    }

    pub fn select(&self, file_name: &str, head: &[u8]) -> ImportResult<&dyn PriceListParser> {
        self.parsers
            .iter()
            .find(|p| p.supports(file_name))
            .or_else(|| self.parsers.iter().find(|p| p.sniff(head)))
            .map(|p| p.as_ref())
            .ok_or_else(|| ImportError::UnsupportedFormat(file_name.to_string()))
    }

    pub fn preview(
        &self,
        file_name: &str,
        bytes: &[u8],
        options: &PreviewOptions,
    ) -> ImportResult<PreviewResult> {
        self.select(file_name, bytes)?.preview(bytes, options)
    }

    pub fn parse(
        &self,
        file_name: &str,
        bytes: &[u8],
        mapping: &ColumnMapping,
    ) -> ImportResult<Vec<NormalizedRow>> {
        self.select(file_name, bytes)?.parse(bytes, mapping)
    }

    pub fn supported_formats(&self) -> Vec<FormatInfo> {
        self.parsers
            .iter()
            .map(|p| FormatInfo {
                name: p.name().to_string(),
                format: p.format(),
                extensions: p.extensions().iter().map(|e| e.to_string()).collect(),
                implemented: p.implemented(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn mapping_abc() -> ColumnMapping {
        ColumnMapping {
            code_column: Some("A".to_string()),
            name_column: Some("B".to_string()),
            price1_column: Some("C".to_string()),
            start_row: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(CsvParser::detect_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(CsvParser::detect_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(CsvParser::detect_delimiter("a,b\n1,2\n"), b',');
        // 价格中的逗号不应干扰分号识别
        assert_eq!(
            CsvParser::detect_delimiter("code;name;price\nA1;Bolt;1,50\nA2;Nut, M8;2,75\n"),
            b';'
        );
        assert_eq!(CsvParser::detect_delimiter(""), b',');
    }

    #[test]
    fn test_csv_parse_with_mapping() {
        let data = "Код;Назва;Ціна\nA-1;Болт М8;1 234,56 грн\n;;\nA-2;Гайка;n/a\n";
        let rows = CsvParser.parse(data.as_bytes(), &mapping_abc()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "A-1");
        assert_eq!(rows[0].name, "Болт М8");
        assert_eq!(rows[0].price1, Some(dec!(1234.56)));
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[1].price1, None);
        assert_eq!(
            rows[1].diagnostics,
            vec![RowDiagnostic::UnparsablePrice {
                slot: PriceSlot::Price1,
                raw: "n/a".to_string()
            }]
        );
    }

    #[test]
    fn test_csv_parse_strips_bom_and_keeps_extra_columns() {
        let mut mapping = mapping_abc();
        mapping
            .extra_columns
            .insert("availability".to_string(), "D".to_string());
        let data = "\u{feff}code,name,price,stock\nX1,Widget,10.5,in stock\n";
        let rows = CsvParser.parse(data.as_bytes(), &mapping).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].extra.get("availability").map(String::as_str), Some("in stock"));
    }

    #[test]
    fn test_csv_rejects_non_utf8() {
        let bytes: &[u8] = &[0x63, 0x6f, 0x64, 0x65, 0x3b, 0xff, 0xfe, 0x0a];
        let err = CsvParser.parse(bytes, &mapping_abc()).unwrap_err();
        assert!(matches!(err, ImportError::MalformedSource(_)));
    }

    #[test]
    fn test_parse_without_usable_mapping_is_missing_mapping() {
        let err = CsvParser
            .parse(b"a,b\n", &ColumnMapping::default())
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingMapping(_)));
    }

    #[test]
    fn test_preview_suggests_start_row_without_header_row() {
        let data = "Прайс-лист ТОВ Постачальник\n\nАртикул;Назва;Ціна\nB-10;Bolt;12,50\nB-11;Nut;3,10\n";
        let options = PreviewOptions {
            row_limit: 2,
            scan_rows: 20,
            mapping: Some(ColumnMapping {
                code_column: Some("A".to_string()),
                name_column: Some("B".to_string()),
                price1_column: Some("C".to_string()),
                ..Default::default()
            }),
        };
        let preview = CsvParser.preview(data.as_bytes(), &options).unwrap();

        assert_eq!(preview.header_guess, vec!["Прайс-лист ТОВ Постачальник".to_string()]);
        assert_eq!(preview.sample_rows.len(), 2);
        assert_eq!(preview.suggested_start_row, Some(4));
    }

    #[test]
    fn test_preview_heuristic_without_mapping() {
        let data = "code,name,price\nA1,Widget,9.99\n";
        let preview = CsvParser.preview(data.as_bytes(), &PreviewOptions::default()).unwrap();
        assert_eq!(preview.suggested_start_row, Some(2));
        assert_eq!(preview.format, SourceFormat::DelimitedText);
    }

    #[test]
    fn test_registry_selects_by_extension_and_content() {
        let registry = ParserRegistry::with_defaults();
        assert_eq!(registry.select("list.CSV", b"").unwrap().name(), "csv");
        assert_eq!(registry.select("list.xlsx", b"").unwrap().name(), "excel");
        assert_eq!(registry.select("upload.bin", b"PK\x03\x04rest").unwrap().name(), "excel");
        assert_eq!(registry.select("scan", b"%PDF-1.7").unwrap().name(), "ai");

        let err = registry.select("notes.docx", b"hello").err().unwrap();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_ai_parser_reports_not_implemented() {
        let registry = ParserRegistry::with_defaults();
        let err = registry
            .parse("scan.pdf", b"%PDF-1.7", &mapping_abc())
            .unwrap_err();
        assert!(matches!(err, ImportError::NotImplemented(_)));

        let err = registry
            .preview("photo.jpg", b"\xFF\xD8\xFF", &PreviewOptions::default())
            .unwrap_err();
        assert!(matches!(err, ImportError::NotImplemented(_)));
    }

    #[test]
    fn test_supported_formats_lists_ai_as_unimplemented() {
        let formats = ParserRegistry::with_defaults().supported_formats();
        assert_eq!(formats.len(), 3);
        let ai = formats.iter().find(|f| f.name == "ai").unwrap();
        assert!(!ai.implemented);
        assert!(formats.iter().filter(|f| f.name != "ai").all(|f| f.implemented));
    }

    #[test]
    fn test_excel_parser_reads_generated_workbook() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Прайс").unwrap();
        sheet.write_string(2, 0, "SKU-1").unwrap();
        sheet.write_string(2, 1, "Steel Hex Bolt M8").unwrap();
        sheet.write_number(2, 2, 12.5).unwrap();
        sheet.write_string(4, 0, "SKU-2").unwrap();
        sheet.write_string(4, 1, "Steel Hex Bolt M10").unwrap();
        sheet.write_string(4, 2, "1 234,50").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let mapping = ColumnMapping {
            code_column: Some("A".to_string()),
            name_column: Some("B".to_string()),
            price1_column: Some("C".to_string()),
            start_row: 2,
            ..Default::default()
        };
        let rows = ExcelParser.parse(&bytes, &mapping).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 3);
        assert_eq!(rows[0].price1, Some(dec!(12.5)));
        assert_eq!(rows[1].code, "SKU-2");
        assert_eq!(rows[1].price1, Some(dec!(1234.50)));

        let preview = ExcelParser
            .preview(
                &bytes,
                &PreviewOptions {
                    mapping: Some(mapping),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(preview.suggested_start_row, Some(3));
    }

    #[test]
    fn test_excel_parser_rejects_corrupt_file() {
        let err = ExcelParser
            .parse(b"PK\x03\x04not really a zip", &mapping_abc())
            .unwrap_err();
        assert!(matches!(err, ImportError::MalformedSource(_)));
    }
}
