//! Attribute Report Encoding
//!
//! ```text
//! array (tag 1)                      attribute reports
//! └─ structure (tag 0)               one report
//!    └─ structure (tag 1)            attribute data
//!       ├─ uint (tag 0)              data version
//!       ├─ structure (tag 1)         path
//!       │  ├─ uint (tag 0)           endpoint
//!       │  ├─ uint (tag 2)           cluster
//!       │  └─ uint (tag 3)           attribute
//!       └─ value (tag 2)             data
//! ```

use crate::error::AttributeError;
use crate::snapshot::{AttributeChanges, AttributeSnapshot};
use tlv_codec::{ElementType, TlvError, TlvReader, TlvValue, TlvWriter};

/// Endpoint hosting the burner clusters
pub const ENDPOINT: u8 = 1;

/// Attribute id reported in every cluster (OnOff, CurrentLevel,
/// MeasuredValue)
pub const ATTRIBUTE_ID: u32 = 0x0000;

/// Cluster ids
pub mod cluster {
    pub const ON_OFF: u32 = 0x0006;
    pub const LEVEL_CONTROL: u32 = 0x0008;
    pub const TEMPERATURE_MEASUREMENT: u32 = 0x0402;
}

const TAG_REPORTS: u8 = 1;
const TAG_ATTRIBUTE_DATA: u8 = 1;
const TAG_DATA_VERSION: u8 = 0;
const TAG_PATH: u8 = 1;
const TAG_DATA: u8 = 2;
const TAG_ENDPOINT: u8 = 0;
const TAG_CLUSTER: u8 = 2;
const TAG_ATTRIBUTE: u8 = 3;

/// Value carried by one report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedValue {
    OnOff(bool),
    Level(u8),
    /// Hundredths of a degree Celsius
    Centidegrees(i32),
}

/// One decoded report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportedAttribute {
    pub data_version: u32,
    pub endpoint: u8,
    pub cluster: u32,
    pub attribute: u32,
    pub value: ReportedValue,
}

/// Encode the attributes named in `changes` into `writer`.
///
/// On error the writer may hold a partial report; callers start over with
/// a fresh buffer.
pub fn encode_report(
    snapshot: &AttributeSnapshot,
    changes: AttributeChanges,
    writer: &mut TlvWriter<'_>,
) -> Result<(), TlvError> {
    writer.encode_array_start(TAG_REPORTS)?;

    if changes.flame {
        write_entry(writer, snapshot, cluster::ON_OFF, |w| {
            w.encode_bool(TAG_DATA, snapshot.flame_state)
        })?;
    }
    if changes.fan_speed {
        write_entry(writer, snapshot, cluster::LEVEL_CONTROL, |w| {
            w.encode_uint8(TAG_DATA, snapshot.fan_speed_pct)
        })?;
    }
    if changes.temperature {
        write_entry(writer, snapshot, cluster::TEMPERATURE_MEASUREMENT, |w| {
            w.encode_int32(TAG_DATA, snapshot.temperature_centidegrees())
        })?;
    }

    writer.encode_container_end()
}

fn write_entry<F>(
    writer: &mut TlvWriter<'_>,
    snapshot: &AttributeSnapshot,
    cluster_id: u32,
    data: F,
) -> Result<(), TlvError>
where
    F: FnOnce(&mut TlvWriter<'_>) -> Result<(), TlvError>,
{
    writer.encode_structure_start(0)?;
    writer.encode_structure_start(TAG_ATTRIBUTE_DATA)?;
    writer.encode_uint32(TAG_DATA_VERSION, snapshot.data_version)?;

    writer.encode_structure_start(TAG_PATH)?;
    writer.encode_uint8(TAG_ENDPOINT, ENDPOINT)?;
    writer.encode_uint32(TAG_CLUSTER, cluster_id)?;
    writer.encode_uint32(TAG_ATTRIBUTE, ATTRIBUTE_ID)?;
    writer.encode_container_end()?;

    data(writer)?;

    writer.encode_container_end()?;
    writer.encode_container_end()
}

/// Parse a payload produced by [`encode_report`]
pub fn decode_report(bytes: &[u8]) -> Result<Vec<ReportedAttribute>, AttributeError> {
    let mut reader = TlvReader::new(bytes);
    expect_open(&mut reader, ElementType::Array, TAG_REPORTS)?;

    let mut out = Vec::new();
    loop {
        let element = next(&mut reader)?;
        match element.element_type {
            ElementType::EndOfContainer => break,
            ElementType::Structure => out.push(decode_entry(&mut reader)?),
            _ => return Err(AttributeError::MalformedReport("expected report structure")),
        }
    }
    Ok(out)
}

fn decode_entry(reader: &mut TlvReader<'_>) -> Result<ReportedAttribute, AttributeError> {
    expect_open(reader, ElementType::Structure, TAG_ATTRIBUTE_DATA)?;

    let data_version = next(reader)?
        .value
        .as_u32()
        .ok_or(AttributeError::MalformedReport("data version"))?;

    expect_open(reader, ElementType::Structure, TAG_PATH)?;
    let endpoint = next(reader)?
        .value
        .as_u8()
        .ok_or(AttributeError::MalformedReport("endpoint"))?;
    let cluster_id = next(reader)?
        .value
        .as_u32()
        .ok_or(AttributeError::MalformedReport("cluster"))?;
    let attribute = next(reader)?
        .value
        .as_u32()
        .ok_or(AttributeError::MalformedReport("attribute"))?;
    expect_close(reader)?;

    let data = next(reader)?;
    let value = match (cluster_id, data.value) {
        (cluster::ON_OFF, TlvValue::Bool(on)) => ReportedValue::OnOff(on),
        (cluster::LEVEL_CONTROL, v) => ReportedValue::Level(
            v.as_u8()
                .ok_or(AttributeError::MalformedReport("level value"))?,
        ),
        (cluster::TEMPERATURE_MEASUREMENT, TlvValue::Signed(c)) => ReportedValue::Centidegrees(c),
        _ => return Err(AttributeError::MalformedReport("unexpected attribute value")),
    };

    expect_close(reader)?;
    expect_close(reader)?;

    Ok(ReportedAttribute {
        data_version,
        endpoint,
        cluster: cluster_id,
        attribute,
        value,
    })
}

fn next<'a>(reader: &mut TlvReader<'a>) -> Result<tlv_codec::Element<'a>, AttributeError> {
    reader
        .next()?
        .ok_or(AttributeError::MalformedReport("unexpected end of report"))
}

fn expect_open(
    reader: &mut TlvReader<'_>,
    kind: ElementType,
    tag: u8,
) -> Result<(), AttributeError> {
    let element = next(reader)?;
    if element.element_type != kind || element.tag != Some(tag) {
        return Err(AttributeError::MalformedReport("unexpected container"));
    }
    Ok(())
}

fn expect_close(reader: &mut TlvReader<'_>) -> Result<(), AttributeError> {
    match next(reader)?.element_type {
        ElementType::EndOfContainer => Ok(()),
        _ => Err(AttributeError::MalformedReport("expected end of container")),
    }
}
