// License-registry converter
//
// Converts the national TCM license registry CSV export into formula
// records. The registry is hand-entered data: product names carry vendor
// quotes in several unicode variants, ingredient fields are free text with
// a unit-weight header, and a handful of rows need per-license patches
// before they parse at all. Unconvertible rows are logged and skipped; a
// bad row never aborts the run.

use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, warn};

use herbswap_core::FormulaRecord;

use crate::config::{ConverterConfig, Patch};
use crate::error::{ConvertError, RowError};

static GRANULE_FORM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^濃縮顆粒劑").unwrap());

static ITEM_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([^”〞"]*)濃縮(?:顆|細)粒"#).unwrap());

// Vendor quotes come in full-width, CJK corner, ASCII, and a broken
// close-close variant.
static VENDOR_QUOTES: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"“([^”]*)”").unwrap(),
        Regex::new(r"〝([^〞]*)〞").unwrap(),
        Regex::new(r#""([^"]*)""#).unwrap(),
        Regex::new(r"”([^”]*)”").unwrap(),
    ]
});

static LICENSE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

static UNIT_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"處方:.*?每\s*([\d.]*)\s*(?:gm?\s*)?(?:公?克\s*)?中?含有?").unwrap()
});

static SECTION_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"生藥|製成|浸膏|比例").unwrap());

static EXTRACT_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"生藥與浸膏").unwrap());

static GRAM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(([\d.]+)\s*(?:gm?|公?克)\)").unwrap());

static MG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(([\d.]+)\s*mg\)").unwrap());

static PERCENT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([\d.]+%\)$").unwrap());

const COL_LICENSE: &str = "許可證字號";
const COL_NAME: &str = "藥品名稱";
const COL_INGREDIENTS: &str = "處方成分";
const COL_VENDOR: &str = "藥商名稱";
const COL_DOSAGE_FORM: &str = "劑型與類別";
const COL_KEY_OVERRIDE: &str = "_key";

/// Options for one conversion run.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Divide each composition by its unit weight and drop the
    /// `unit_dosage` field, so amounts are per gram of product.
    pub use_unit_dosage: bool,

    /// Keep only rows whose vendor matches this pattern. An invalid
    /// pattern falls back to literal substring matching.
    pub filter_vendor: Option<String>,
}

enum VendorFilter {
    Pattern(Regex),
    Literal(String),
}

impl VendorFilter {
    fn compile(pattern: &str) -> Self {
        match Regex::new(&format!("(?m){pattern}")) {
            Ok(regex) => Self::Pattern(regex),
            Err(_) => {
                warn!("invalid vendor filter regex, matching as plain text: {pattern:?}");
                Self::Literal(pattern.to_string())
            }
        }
    }

    fn matches(&self, vendor: &str) -> bool {
        match self {
            Self::Pattern(regex) => regex.is_match(vendor),
            Self::Literal(text) => vendor.contains(text),
        }
    }
}

type Row = IndexMap<String, String>;

/// Converts registry CSV exports into formula records.
#[derive(Debug, Default)]
pub struct LicenseConverter {
    config: ConverterConfig,
}

impl LicenseConverter {
    /// Converter with the given correction config.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Converter configured from a YAML file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        Ok(Self::new(ConverterConfig::from_file(path)?))
    }

    /// Convert a registry CSV file.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<Vec<FormulaRecord>, ConvertError> {
        let text = std::fs::read_to_string(path)?;
        self.parse(&text, options)
    }

    /// Convert registry CSV text.
    pub fn parse(
        &self,
        text: &str,
        options: &LoadOptions,
    ) -> Result<Vec<FormulaRecord>, ConvertError> {
        // Registry exports carry a UTF-8 BOM.
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let filter = options.filter_vendor.as_deref().map(VendorFilter::compile);

        let mut records = Vec::new();
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        for row in reader.deserialize::<Row>() {
            let mut row = row?;
            let item = row.get(COL_NAME).cloned().unwrap_or_default();
            debug!("converting item: {item:?}");

            self.apply_patches(&mut row);
            match self.convert_row(&row, options, filter.as_ref()) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!("skipping filtered item: {item:?}"),
                Err(err) => error!("cannot convert item {item:?}: {err}"),
            }
        }
        Ok(records)
    }

    /// Serialize records to YAML text, amounts rounded to three decimals.
    pub fn dump_to_string(&self, records: &[FormulaRecord]) -> Result<String, ConvertError> {
        let rounded: Vec<FormulaRecord> = records.iter().map(round_record).collect();
        Ok(serde_yaml::to_string(&rounded)?)
    }

    /// Write records to a YAML database file.
    pub fn dump(
        &self,
        records: &[FormulaRecord],
        path: impl AsRef<Path>,
    ) -> Result<(), ConvertError> {
        let text = self.dump_to_string(records)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn apply_patches(&self, row: &mut Row) {
        let Some(id) = row.get(COL_LICENSE).cloned() else {
            return;
        };
        let Some(patches) = self.config.patch.get(&id) else {
            return;
        };
        debug!("applying patches to {id:?}");
        for patch in patches {
            if let Err(err) = apply_patch(row, patch) {
                error!("cannot apply patch to {id:?}: {err}");
            }
        }
    }

    fn convert_row(
        &self,
        row: &Row,
        options: &LoadOptions,
        filter: Option<&VendorFilter>,
    ) -> Result<Option<FormulaRecord>, RowError> {
        if let Some(form) = row.get(COL_DOSAGE_FORM) {
            if !GRANULE_FORM.is_match(form) {
                return Ok(None);
            }
        }

        let name_field = row
            .get(COL_NAME)
            .ok_or(RowError::MissingColumn(COL_NAME))?;
        let license = row
            .get(COL_LICENSE)
            .ok_or(RowError::MissingColumn(COL_LICENSE))?;
        let ingredients = row
            .get(COL_INGREDIENTS)
            .ok_or(RowError::MissingColumn(COL_INGREDIENTS))?;

        let vendor = match row.get(COL_VENDOR).map(|v| v.trim()) {
            Some(vendor) if !vendor.is_empty() => vendor.to_string(),
            _ => vendor_from_name(name_field),
        };
        if let Some(filter) = filter {
            if !filter.matches(&vendor) {
                return Ok(None);
            }
        }

        let name = item_name(name_field);
        let key = match row.get(COL_KEY_OVERRIDE) {
            Some(key) => key.clone(),
            None => self.item_key(name_field),
        };
        let url = license_url(license)?;
        let (mut composition, unit_dosage) = self.parse_ingredients(ingredients)?;

        let unit_dosage = if options.use_unit_dosage {
            for amount in composition.values_mut() {
                *amount /= unit_dosage;
            }
            None
        } else {
            Some(unit_dosage)
        };

        Ok(Some(FormulaRecord {
            name,
            key,
            vendor: (!vendor.is_empty()).then_some(vendor),
            url: Some(url),
            unit_dosage,
            composition,
        }))
    }

    /// Extract the formula key from the product name.
    ///
    /// The key is whatever precedes 濃縮顆粒/濃縮細粒 after the vendor
    /// quote; names without that marker fall back to the full first line.
    fn item_key(&self, text: &str) -> String {
        let raw = match ITEM_KEY.captures(text) {
            Some(captures) => captures[1].trim().to_string(),
            None => {
                warn!("cannot parse product name, using full name as key: {text:?}");
                item_name(text)
            }
        };
        self.config.remap_key(&raw).to_string()
    }

    /// Parse the ingredient field into herb amounts and the unit weight.
    fn parse_ingredients(&self, text: &str) -> Result<(IndexMap<String, f64>, f64), RowError> {
        let lines: Vec<&str> = text.split('\n').collect();
        let header = lines.first().copied().unwrap_or_default();

        let captures = UNIT_HEADER
            .captures(header)
            .ok_or_else(|| RowError::BadUnitHeader(header.to_string()))?;
        let unit_dosage = if captures[1].is_empty() {
            1.0
        } else {
            captures[1]
                .parse::<f64>()
                .map_err(|_| RowError::BadUnitHeader(header.to_string()))?
        };

        let mut composition = IndexMap::new();

        // Herb lines run until the extract note (以上生藥製成浸膏...);
        // excipient lines follow it until a blank line.
        let mut i = 1;
        while i < lines.len() {
            if SECTION_BREAK.is_match(lines[i]) {
                break;
            }
            self.add_ingredient_line(&mut composition, lines[i], i)?;
            i += 1;
        }
        i += 1;
        while i < lines.len() {
            if lines[i].is_empty() {
                break;
            }
            // Badly wrapped extract notes spill onto their own line.
            if !EXTRACT_NOTE.is_match(lines[i]) {
                self.add_ingredient_line(&mut composition, lines[i], i)?;
            }
            i += 1;
        }

        Ok((composition, unit_dosage))
    }

    fn add_ingredient_line(
        &self,
        composition: &mut IndexMap<String, f64>,
        line: &str,
        index: usize,
    ) -> Result<(), RowError> {
        let (name, amount) = parse_ingredient_line(line, index)?;
        let name = PERCENT_SUFFIX.replace(&name, "");
        if let Some(herb) = self.config.remap_herb(&name) {
            *composition.entry(herb.to_string()).or_insert(0.0) += amount;
        }
        Ok(())
    }
}

/// First line of the product name field.
fn item_name(text: &str) -> String {
    text.split('\n').next().unwrap_or_default().to_string()
}

/// Vendor name from the quoted prefix of the product name.
fn vendor_from_name(text: &str) -> String {
    for quote in VENDOR_QUOTES.iter() {
        if let Some(captures) = quote.captures(text) {
            return captures[1].trim().to_string();
        }
    }
    warn!("cannot parse product name, no vendor found: {text:?}");
    String::new()
}

/// Registry detail URL from the license id's numeric part.
fn license_url(license: &str) -> Result<String, RowError> {
    let number = LICENSE_NUMBER
        .find(license)
        .ok_or_else(|| RowError::NoLicenseNumber(license.to_string()))?;
    Ok(format!(
        "https://service.mohw.gov.tw/DOCMAP/CusSite/TCMLResultDetail.aspx?LICEWORDID=01&LICENUM={}",
        number.as_str()
    ))
}

/// One ingredient line: a name followed by an amount in g, gm, 克, or mg.
fn parse_ingredient_line(line: &str, index: usize) -> Result<(String, f64), RowError> {
    let bad_line = || RowError::BadIngredientLine {
        line: index + 1,
        text: line.to_string(),
    };

    if let Some(captures) = GRAM_LINE.captures(line) {
        let amount = captures[2].parse::<f64>().map_err(|_| bad_line())?;
        return Ok((captures[1].to_string(), amount));
    }
    if let Some(captures) = MG_LINE.captures(line) {
        let amount = captures[2].parse::<f64>().map_err(|_| bad_line())?;
        return Ok((captures[1].to_string(), amount / 1000.0));
    }
    Err(bad_line())
}

fn apply_patch(row: &mut Row, patch: &Patch) -> Result<(), String> {
    match patch {
        Patch::Replace {
            field,
            pattern,
            repl,
            count,
        } => {
            let value = row
                .get_mut(field)
                .ok_or_else(|| format!("no field {field:?}"))?;
            *value = match count {
                Some(count) => value.replacen(pattern.as_str(), repl, *count),
                None => value.replace(pattern.as_str(), repl),
            };
            Ok(())
        }
        Patch::ReplaceRe {
            field,
            pattern,
            repl,
            count,
        } => {
            let regex = Regex::new(&format!("(?m){pattern}"))
                .map_err(|err| format!("bad pattern {pattern:?}: {err}"))?;
            let value = row
                .get_mut(field)
                .ok_or_else(|| format!("no field {field:?}"))?;
            *value = regex.replacen(value, *count, repl.as_str()).into_owned();
            Ok(())
        }
        Patch::SetKey { value } => {
            row.insert(COL_KEY_OVERRIDE.to_string(), value.clone());
            Ok(())
        }
    }
}

fn round_record(record: &FormulaRecord) -> FormulaRecord {
    let mut record = record.clone();
    record.unit_dosage = record.unit_dosage.map(round3);
    for amount in record.composition.values_mut() {
        *amount = round3(*amount);
    }
    record
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
