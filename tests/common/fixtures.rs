// Gemeinsame Fixture-Bausteine fuer Decode- und CLI-Tests.
//
// Wird per `include!` eingebunden. Benötigte Imports: keine (voll qualifiziert).

const CODE_BITS: u32 = 10;
const MAX_VALUE: u16 = 1023;
const MAX_CODE: u16 = 1022;
const FIRST_CODE: u16 = 256;

/// Packs 10-bit codes MSB-first, zero-padding the last byte.
fn pack_codes(codes: &[u16]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc: u64 = 0;
    let mut bits: u32 = 0;
    for &code in codes {
        acc = (acc << CODE_BITS) | u64::from(code);
        bits += CODE_BITS;
        while bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
        acc &= (1u64 << bits) - 1;
    }
    if bits > 0 {
        out.push((acc << (8 - bits)) as u8);
    }
    out
}

/// 10-bit LZW compression with a frozen dictionary after code 1022,
/// terminated by the 1023 sentinel.
fn lzw_compress(data: &[u8]) -> Vec<u8> {
    let mut dict: std::collections::BTreeMap<(u16, u8), u16> = std::collections::BTreeMap::new();
    let mut next_code = FIRST_CODE;
    let mut codes = Vec::with_capacity(data.len());

    let mut iter = data.iter().copied();
    if let Some(first) = iter.next() {
        let mut w = u16::from(first);
        for c in iter {
            match dict.get(&(w, c)) {
                Some(&code) => w = code,
                None => {
                    codes.push(w);
                    if next_code <= MAX_CODE {
                        dict.insert((w, c), next_code);
                        next_code += 1;
                    }
                    w = u16::from(c);
                }
            }
        }
        codes.push(w);
    }
    codes.push(MAX_VALUE);
    pack_codes(&codes)
}

/// Raw values whose delta decoding yields exactly `samples`.
///
/// Returns `(raw, seed)`.
fn delta_encode(samples: &[i16]) -> (Vec<i16>, i16) {
    let n = samples.len();
    let s = |i: usize| i32::from(samples[i]);
    if n < 3 {
        return (samples.to_vec(), 0);
    }
    let seed = (2 * s(1) - s(0) - s(2)) as i16;
    let mut raw = vec![0i16; n];
    raw[0] = samples[0];
    raw[1] = samples[1];
    for k in 2..n - 1 {
        raw[k] = (2 * s(k) - s(k - 1) - s(k + 1) + 64) as i16;
    }
    raw[n - 1] = 64;
    (raw, seed)
}

/// High bytes of all values, then low bytes.
fn planar(raw: &[i16]) -> Vec<u8> {
    let mut out: Vec<u8> = raw.iter().map(|v| v.to_be_bytes()[0]).collect();
    out.extend(raw.iter().map(|v| v.to_be_bytes()[1]));
    out
}

/// One XLI chunk: header + LZW payload.
fn chunk_from_payload(payload: &[u8], seed: i16) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x0102i16.to_le_bytes());
    out.extend_from_slice(&seed.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Chunk that decodes to exactly `samples` (before reconstruction).
fn encode_lead(samples: &[i16]) -> Vec<u8> {
    let (raw, seed) = delta_encode(samples);
    chunk_from_payload(&lzw_compress(&planar(&raw)), seed)
}

/// Residuals the decoder turns back into `leads` after reconstruction.
///
/// `leads` are final values in canonical order (I, II, III, aVR, aVL, aVF, ...).
fn stored_leads(leads: &[Vec<i16>]) -> Vec<Vec<i16>> {
    let mut stored = leads.to_vec();
    if leads.len() < 3 {
        return stored;
    }
    let n = leads[0].len();
    for k in 0..n {
        let i = i32::from(leads[0][k]);
        let ii = i32::from(leads[1][k]);
        let iii = i32::from(leads[2][k]);
        stored[2][k] = (ii - i - iii) as i16;
        if leads.len() > 3 {
            stored[3][k] = (-((i + ii) / 2) - i32::from(leads[3][k])) as i16;
        }
        if leads.len() > 4 {
            stored[4][k] = ((i - iii) / 2 - i32::from(leads[4][k])) as i16;
        }
        if leads.len() > 5 {
            stored[5][k] = ((ii + iii) / 2 - i32::from(leads[5][k])) as i16;
        }
    }
    stored
}

/// Decoded XLI buffer for the final lead values `leads`.
fn encode_record(leads: &[Vec<i16>]) -> Vec<u8> {
    stored_leads(leads).iter().flat_map(|l| encode_lead(l)).collect()
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Wraps base64 text at 76 columns like the devices do.
fn wrap_base64(text: &str) -> String {
    text.as_bytes()
        .chunks(76)
        .map(|line| format!("      {}\n", std::str::from_utf8(line).unwrap()))
        .collect()
}

/// Deterministic ECG-like samples (slow wave + small noise).
fn synthetic_lead(seed: u32, count: usize) -> Vec<i16> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..count)
        .map(|t| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let noise = ((state >> 16) % 7) as i32 - 3;
            let wave = ((t as i32 + seed as i32 * 13) % 200 - 100) * 3;
            (wave + noise) as i16
        })
        .collect()
}

/// Twelve independent synthetic leads in canonical order.
fn synthetic_12_lead(count: usize) -> Vec<Vec<i16>> {
    let i = synthetic_lead(1, count);
    let ii = synthetic_lead(2, count);
    let mut leads = vec![i, ii];
    for seed in 3..=12 {
        leads.push(synthetic_lead(seed, count));
    }
    leads
}

/// 1.04 document with Base64 + XLI waveforms.
fn sierra_xml_104(waveform_bytes: &[u8], leads: usize, sampling_rate: u32, duration_ms: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<restingecgdata xmlns="http://www3.medical.philips.com">
  <documentinfo>
    <documentname>test.xml</documentname>
    <documenttype>PhilipsECG</documenttype>
    <documentversion>1.04</documentversion>
  </documentinfo>
  <dataacquisition>
    <signalcharacteristics>
      <samplingrate>{sampling_rate}</samplingrate>
    </signalcharacteristics>
  </dataacquisition>
  <waveforms>
    <parsedwaveforms dataencoding="Base64" compression="XLI" numberofleads="{leads}" durationperchannel="{duration_ms}">
{}    </parsedwaveforms>
  </waveforms>
</restingecgdata>
"#,
        wrap_base64(&base64_encode(waveform_bytes))
    )
}

/// 1.03 document with Base64 + XLI waveforms.
fn sierra_xml_103(waveform_bytes: &[u8], channels: usize, sampling_rate: u32, duration_ms: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<restingecgdata xmlns="http://www3.medical.philips.com">
  <documentinfo>
    <documenttype>SierraECG</documenttype>
    <documentversion>1.03</documentversion>
  </documentinfo>
  <dataacquisition>
    <signalcharacteristics>
      <samplingrate>{sampling_rate}</samplingrate>
      <numberchannelsvalid>{channels}</numberchannelsvalid>
    </signalcharacteristics>
  </dataacquisition>
  <waveforms>
    <parsedwaveforms dataencoding="Base64" compressflag="True" compressmethod="XLI" durationperchannel="{duration_ms}">{}</parsedwaveforms>
  </waveforms>
</restingecgdata>
"#,
        base64_encode(waveform_bytes)
    )
}

/// Parses the plain grid of a rewritten document back into samples.
fn grid_values(xml: &str) -> Vec<i16> {
    let start = xml.find("<parsedwaveforms").expect("parsedwaveforms start");
    let open_end = start + xml[start..].find('>').expect("start tag end") + 1;
    let close = xml.find("</parsedwaveforms>").expect("parsedwaveforms end");
    xml[open_end..close]
        .split_whitespace()
        .map(|v| v.parse().expect("numeric sample"))
        .collect()
}
