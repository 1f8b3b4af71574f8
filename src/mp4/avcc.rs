//! A module for parsing AVCConfigurationBox (avcC) data.
//! Only the record header and parameter sets are decoded; the SPS is kept opaque.

use crate::errors::{IntegrityError, MediaRecodeResult};

/// Represents the parsed AVCDecoderConfigurationRecord (avcC) configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AvccConfig {
    /// configurationVersion
    pub configuration_version: u8,
    /// AVCProfileIndication
    pub profile: u8,
    /// profileCompatibility
    pub compatibility: u8,
    /// AVCLevelIndication
    pub level: u8,
    /// lengthSizeMinusOne
    pub length_size_minus_one: u8,
    /// Sequence Parameter Sets
    pub sps: Vec<Vec<u8>>,
    /// Picture Parameter Sets
    pub pps: Vec<Vec<u8>>,
}

fn read_parameter_sets(
    data: &[u8],
    pos: &mut usize,
    count: usize,
    what: &str,
) -> MediaRecodeResult<Vec<Vec<u8>>> {
    let mut sets = Vec::with_capacity(count);
    for _ in 0..count {
        if *pos + 2 > data.len() {
            return Err(IntegrityError::new(format!("avcC ends inside {} length", what)).into());
        }
        let len = u16::from_be_bytes([data[*pos], data[*pos + 1]]) as usize;
        *pos += 2;
        if *pos + len > data.len() {
            return Err(IntegrityError::new(format!("avcC ends inside {} data", what)).into());
        }
        sets.push(data[*pos..*pos + len].to_vec());
        *pos += len;
    }
    Ok(sets)
}

impl AvccConfig {
    /// Parse AVCDecoderConfigurationRecord as defined in ISO/IEC 14496-15.
    ///
    /// data: full contents of the avcC box (excluding header).
    pub fn parse(data: &[u8]) -> MediaRecodeResult<Self> {
        if data.len() < 7 {
            return Err(IntegrityError::new("avcC data too short").into());
        }
        let mut pos = 6;
        // numOfSequenceParameterSets: 3 bits reserved + 5 bits count
        let sps = read_parameter_sets(data, &mut pos, (data[5] & 0x1F) as usize, "SPS")?;
        if pos >= data.len() {
            return Err(IntegrityError::new("avcC ends before PPS count").into());
        }
        let num_pps = data[pos] as usize;
        pos += 1;
        let pps = read_parameter_sets(data, &mut pos, num_pps, "PPS")?;
        Ok(AvccConfig {
            configuration_version: data[0],
            profile: data[1],
            compatibility: data[2],
            level: data[3],
            length_size_minus_one: data[4] & 0x03,
            sps,
            pps,
        })
    }

    /// RFC 6381 codec string, e.g. `avc1.64001F`.
    pub fn codec_string(&self, format: &str) -> String {
        format!(
            "{}.{:02X}{:02X}{:02X}",
            format, self.profile, self.compatibility, self.level
        )
    }

    pub fn profile_name(&self) -> &'static str {
        match self.profile {
            66 => "Baseline",
            77 => "Main",
            88 => "Extended",
            100 => "High",
            110 => "High 10",
            122 => "High 4:2:2",
            244 => "High 4:4:4",
            _ => "Unknown",
        }
    }

    /// Size in bytes of the NAL unit length prefix in samples.
    pub fn nal_length_size(&self) -> usize {
        self.length_size_minus_one as usize + 1
    }

    /// Check if configuration is valid
    pub fn is_valid(&self) -> bool {
        !self.sps.is_empty() && !self.pps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Vec<u8> {
        let mut data = vec![1, 0x64, 0x00, 0x1F, 0xFF, 0xE1];
        data.extend_from_slice(&[0, 4, 0x67, 0x64, 0x00, 0x1F]);
        data.push(1);
        data.extend_from_slice(&[0, 2, 0x68, 0xEE]);
        data
    }

    #[test]
    fn test_parse_avcc() {
        let config = AvccConfig::parse(&sample_record()).unwrap();
        assert_eq!(config.profile, 100);
        assert_eq!(config.level, 31);
        assert_eq!(config.nal_length_size(), 4);
        assert_eq!(config.sps, vec![vec![0x67, 0x64, 0x00, 0x1F]]);
        assert_eq!(config.pps, vec![vec![0x68, 0xEE]]);
        assert!(config.is_valid());
        assert_eq!(config.codec_string("avc1"), "avc1.64001F");
        assert_eq!(config.profile_name(), "High");
    }

    #[test]
    fn test_truncated_avcc() {
        let data = sample_record();
        assert!(AvccConfig::parse(&data[..9]).is_err());
        assert!(AvccConfig::parse(&data[..3]).is_err());
    }
}
