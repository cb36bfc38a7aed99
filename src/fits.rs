use anyhow::{anyhow, bail, Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use fitrs::{Fits, FitsData, FitsDataArray};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

use crate::raster::Raster;

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Keyword written on every saved file to mark it as pipeline output
pub const PROVENANCE_KEY: &str = "PROCSTAT";
pub const PROVENANCE_VALUE: &str = "processed";

/// Keywords that describe layout, scaling or integrity of the data block.
/// They are regenerated on save rather than copied from the source.
const EXCLUDED_KEYS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "BZERO", "BSCALE",
    "BLANK", "CHECKSUM", "DATASUM", "END",
];

/// A typed header value
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    /// Free text of a COMMENT or HISTORY card
    Commentary(String),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Integer(n) => Some(*n as f64),
            HeaderValue::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) | HeaderValue::Commentary(s) => Some(s),
            _ => None,
        }
    }
}

/// Ordered FITS header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<(String, HeaderValue)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a card; repeated keys are kept in order
    pub fn push(&mut self, key: impl Into<String>, value: HeaderValue) {
        self.cards.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(HeaderValue::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// True for keywords that must never be carried over into a saved file
pub fn is_excluded_key(key: &str) -> bool {
    if EXCLUDED_KEYS.contains(&key) {
        return true;
    }
    key.strip_prefix("NAXIS")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Load the primary image of a FITS file.
///
/// Samples are converted to physical values (`BZERO + BSCALE * raw`) but are
/// otherwise left in their original dynamic range. Channel-first cubes are
/// reordered to channel-last and a singleton channel axis is squeezed.
pub fn load(path: &Path) -> Result<(Raster, Header)> {
    let (header, header_len) = read_primary_header(path)?;

    let naxis = header
        .get_i64("NAXIS")
        .ok_or_else(|| anyhow!("Missing NAXIS header"))?;
    if naxis == 0 {
        bail!("FITS file has no primary data block");
    }
    if !(2..=3).contains(&naxis) {
        bail!("Unsupported number of axes: NAXIS={}", naxis);
    }

    let dims = (1..=naxis)
        .map(|i| {
            header
                .get_i64(&format!("NAXIS{}", i))
                .filter(|&n| n > 0)
                .map(|n| n as usize)
                .ok_or_else(|| anyhow!("Missing or invalid NAXIS{} header", i))
        })
        .collect::<Result<Vec<usize>>>()?;

    let bitpix = header
        .get_i64("BITPIX")
        .ok_or_else(|| anyhow!("Missing BITPIX header"))?;
    let sample_size = match bitpix {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        64 | -64 => 8,
        other => bail!("Unsupported BITPIX value: {}", other),
    };

    let expected: usize = dims.iter().product();
    let data_len = expected as u64 * sample_size;
    let file_len = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat FITS file: {}", path.display()))?
        .len();
    if file_len < header_len + data_len {
        bail!(
            "Truncated FITS data: header declares {} bytes of samples, file holds {}",
            data_len,
            file_len.saturating_sub(header_len)
        );
    }

    let scaling = Scaling {
        bzero: header.get_f64("BZERO").unwrap_or(0.0),
        bscale: header.get_f64("BSCALE").unwrap_or(1.0),
    };
    let samples = if bitpix == 64 {
        read_i64_samples(path, header_len, expected, header.get_i64("BLANK"), scaling)?
    } else {
        read_samples(path, scaling)?
    };

    if samples.len() != expected {
        bail!(
            "Data size mismatch: expected {} samples, got {}",
            expected,
            samples.len()
        );
    }

    let raster = canonicalize(&dims, samples)?;
    debug!(
        "Loaded {} with shape {:?} ({} header cards)",
        path.display(),
        raster.shape(),
        header.len()
    );
    Ok((raster, header))
}

/// Linear mapping from stored to physical values
#[derive(Debug, Clone, Copy)]
struct Scaling {
    bzero: f64,
    bscale: f64,
}

impl Scaling {
    /// Physical value of a raw sample; non-finite results become 0.0
    fn apply(&self, raw: f64) -> f64 {
        let value = self.bzero + self.bscale * raw;
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

/// Decode the primary data block through fitrs, applying linear scaling.
/// Undefined samples become 0.0.
fn read_samples(path: &Path, scaling: Scaling) -> Result<Vec<f64>> {
    let fits = Fits::open(path)
        .with_context(|| format!("Failed to open FITS file: {}", path.display()))?;
    let hdu = fits
        .get(0)
        .ok_or_else(|| anyhow!("No primary HDU found in FITS file"))?;
    let physical = |raw: f64| scaling.apply(raw);

    let samples = match hdu.read_data() {
        // BITPIX 8: fitrs hands back each unsigned byte as a char
        FitsData::Characters(FitsDataArray { data, .. }) => {
            data.iter().map(|&c| physical(c as u32 as f64)).collect()
        }
        FitsData::IntegersI32(FitsDataArray { data, .. }) => data
            .iter()
            .map(|&raw| raw.map_or(0.0, |v| physical(v as f64)))
            .collect(),
        FitsData::IntegersU32(FitsDataArray { data, .. }) => data
            .iter()
            .map(|&raw| raw.map_or(0.0, |v| physical(v as f64)))
            .collect(),
        FitsData::FloatingPoint32(FitsDataArray { data, .. }) => {
            data.iter().map(|&v| physical(v as f64)).collect()
        }
        FitsData::FloatingPoint64(FitsDataArray { data, .. }) => {
            data.iter().map(|&v| physical(v)).collect()
        }
    };

    Ok(samples)
}

/// Decode BITPIX 64 samples, which fitrs does not support
fn read_i64_samples(
    path: &Path,
    offset: u64,
    count: usize,
    blank: Option<i64>,
    scaling: Scaling,
) -> Result<Vec<f64>> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open FITS file: {}", path.display()))?;
    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(file);

    (0..count)
        .map(|_| -> Result<f64> {
            let raw = reader
                .read_i64::<BigEndian>()
                .context("Failed to read 64-bit FITS samples")?;
            Ok(if Some(raw) == blank {
                0.0
            } else {
                scaling.apply(raw as f64)
            })
        })
        .collect()
}

/// Arrange samples (FITS axis order, NAXIS1 fastest) into a channel-last raster
fn canonicalize(dims: &[usize], samples: Vec<f64>) -> Result<Raster> {
    if dims.len() == 2 {
        return Ok(Raster::new(dims[0], dims[1], 1, samples));
    }

    let leading = dims[2];
    if matches!(leading, 1 | 3 | 4) {
        // Planes stored one after another
        let (width, height) = (dims[0], dims[1]);
        let plane_len = width * height;
        let keep = leading.min(3);
        let planes: Vec<Vec<f64>> = samples
            .chunks(plane_len)
            .take(keep)
            .map(|p| p.to_vec())
            .collect();
        return Ok(Raster::from_planes(width, height, &planes));
    }

    // Already interleaved, NAXIS1 is the channel axis
    let (channels, width, height) = (dims[0], dims[1], dims[2]);
    match channels {
        1 | 3 => Ok(Raster::new(width, height, channels, samples)),
        4 => {
            let data = samples
                .chunks(4)
                .flat_map(|px| px[..3].to_vec())
                .collect();
            Ok(Raster::new(width, height, 3, data))
        }
        n => bail!(
            "Unsupported channel layout: {:?} ({} channels)",
            dims,
            n
        ),
    }
}

/// Read header blocks of the primary HDU until the END card.
/// Returns the header and its padded length in bytes.
fn read_primary_header(path: &Path) -> Result<(Header, u64)> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open FITS file: {}", path.display()))?;

    let mut header = Header::new();
    let mut first_card = true;
    let mut header_len = 0u64;
    loop {
        let mut block = vec![0u8; BLOCK_SIZE];
        file.read_exact(&mut block)
            .context("Truncated FITS header: END card not found")?;
        header_len += BLOCK_SIZE as u64;

        for chunk in block.chunks(CARD_SIZE) {
            let card: String = chunk
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect();

            if first_card {
                if !card.starts_with("SIMPLE") {
                    bail!("Not a FITS file: primary header does not start with SIMPLE");
                }
                first_card = false;
            }

            let keyword = card[..8].trim_end();
            if keyword == "END" {
                return Ok((header, header_len));
            }
            if let Some(value) = parse_card(keyword, &card) {
                header.push(keyword, value);
            }
        }
    }
}

fn parse_card(keyword: &str, card: &str) -> Option<HeaderValue> {
    if keyword.is_empty() {
        return None;
    }
    if keyword == "COMMENT" || keyword == "HISTORY" {
        return Some(HeaderValue::Commentary(card[8..].trim().to_string()));
    }
    if &card[8..10] != "= " {
        return None;
    }
    parse_value(&card[10..])
}

/// Parse the value field of a card (everything after `= `)
fn parse_value(field: &str) -> Option<HeaderValue> {
    let field = field.trim_start();

    if let Some(rest) = field.strip_prefix('\'') {
        // Quoted string, '' is an escaped quote
        let mut text = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    text.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                text.push(c);
            }
        }
        return Some(HeaderValue::Text(text.trim_end().to_string()));
    }

    let value = match field.find('/') {
        Some(pos) => field[..pos].trim(),
        None => field.trim(),
    };

    match value {
        "" => None,
        "T" => Some(HeaderValue::Logical(true)),
        "F" => Some(HeaderValue::Logical(false)),
        _ => {
            if let Ok(n) = value.parse::<i64>() {
                Some(HeaderValue::Integer(n))
            } else if let Ok(f) = value.replace(['D', 'd'], "E").parse::<f64>() {
                Some(HeaderValue::Real(f))
            } else {
                Some(HeaderValue::Text(value.to_string()))
            }
        }
    }
}

/// Write a raster as a 32-bit float FITS file, replacing any existing file.
///
/// Multi-channel data is written channel-first (`NAXIS3` = channels). Source
/// header cards are copied except the excluded layout keys, followed by a
/// provenance marker and a HISTORY line.
pub fn save(raster: &Raster, path: &Path, header: &Header) -> Result<()> {
    let mut cards = vec![
        value_card("SIMPLE", "T"),
        value_card("BITPIX", "-32"),
        value_card("NAXIS", if raster.channels > 1 { "3" } else { "2" }),
        value_card("NAXIS1", &raster.width.to_string()),
        value_card("NAXIS2", &raster.height.to_string()),
    ];
    if raster.channels > 1 {
        cards.push(value_card("NAXIS3", &raster.channels.to_string()));
    }

    for (key, value) in header.iter() {
        if is_excluded_key(key) || key == PROVENANCE_KEY {
            continue;
        }
        if let Some(card) = format_card(key, value) {
            cards.push(card);
        }
    }

    cards.push(text_card(PROVENANCE_KEY, PROVENANCE_VALUE));
    cards.push(commentary_card(
        "HISTORY",
        &format!("Processed by fits-polish {}", env!("CARGO_PKG_VERSION")),
    ));
    cards.push(format!("{:<80}", "END"));

    let file = File::create(path)
        .with_context(|| format!("Failed to create FITS file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for card in &cards {
        writer.write_all(card.as_bytes())?;
    }
    let header_len = cards.len() * CARD_SIZE;
    writer.write_all(&vec![b' '; padding(header_len)])?;

    // Channel-first plane order
    for channel in 0..raster.channels {
        for i in 0..raster.pixel_count() {
            let value = raster.data[i * raster.channels + channel] as f32;
            writer.write_f32::<BigEndian>(value)?;
        }
    }
    let data_len = raster.data.len() * 4;
    writer.write_all(&vec![0u8; padding(data_len)])?;

    writer
        .flush()
        .with_context(|| format!("Failed to write FITS file: {}", path.display()))?;
    debug!("Wrote {} ({} header cards)", path.display(), cards.len());
    Ok(())
}

fn padding(len: usize) -> usize {
    (BLOCK_SIZE - len % BLOCK_SIZE) % BLOCK_SIZE
}

fn format_card(key: &str, value: &HeaderValue) -> Option<String> {
    if key.is_empty() || key.len() > 8 || !key.is_ascii() {
        return None;
    }
    let card = match value {
        HeaderValue::Logical(b) => value_card(key, if *b { "T" } else { "F" }),
        HeaderValue::Integer(n) => value_card(key, &n.to_string()),
        HeaderValue::Real(f) if f.is_finite() => value_card(key, &format!("{:.10E}", f)),
        HeaderValue::Real(_) => return None,
        HeaderValue::Text(s) => text_card(key, s),
        HeaderValue::Commentary(s) => commentary_card(key, s),
    };
    Some(card)
}

/// Fixed-format card, value right-justified to column 30
fn value_card(key: &str, value: &str) -> String {
    fit_card(format!("{:<8}= {:>20}", key, value))
}

fn text_card(key: &str, text: &str) -> String {
    let mut escaped = String::new();
    for c in text.chars() {
        let c = if c.is_ascii() && !c.is_ascii_control() { c } else { '?' };
        let piece = if c == '\'' { "''".to_string() } else { c.to_string() };
        if escaped.len() + piece.len() > 68 {
            break;
        }
        escaped.push_str(&piece);
    }
    fit_card(format!("{:<8}= '{:<8}'", key, escaped))
}

fn commentary_card(key: &str, text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .take(72)
        .collect();
    fit_card(format!("{:<8}{}", key, text))
}

/// Pad or cut to exactly one card
fn fit_card(mut card: String) -> String {
    card.truncate(CARD_SIZE);
    format!("{:<80}", card)
}
