//! JPEG header synthesis for RTP/JPEG (RFC 2435) payloads.
//!
//! The wire format strips every marker segment from the JPEG stream; the
//! receiver rebuilds SOI, quantization, frame, Huffman and scan headers
//! from the three bytes of type information in each packet plus the
//! quantization table carried in the first fragment. The Huffman tables
//! are the fixed ones from JPEG Annex K, which is all a baseline MJPEG
//! sender may use here.

/// Frame type 0: 4:2:2 chroma subsampling. Type 1: 4:2:0.
pub fn sampling_supported(frame_type: u8) -> bool {
    frame_type <= 1
}

const LUM_DC_CODELENS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const LUM_DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const LUM_AC_CODELENS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
const LUM_AC_SYMBOLS: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
    0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52,
    0xd1, 0xf0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25,
    0x26, 0x27, 0x28, 0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45,
    0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64,
    0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83,
    0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
    0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
    0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3,
    0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8,
    0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
];

const CHM_DC_CODELENS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
const CHM_DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const CHM_AC_CODELENS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
const CHM_AC_SYMBOLS: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61,
    0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33,
    0x52, 0xf0, 0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18,
    0x19, 0x1a, 0x26, 0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44,
    0x45, 0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63,
    0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a,
    0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97,
    0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
    0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca,
    0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7,
    0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
];

fn put_quant_table(out: &mut Vec<u8>, table: &[u8; 64], id: u8) {
    out.extend_from_slice(&[0xff, 0xdb, 0x00, 67, id]);
    out.extend_from_slice(table);
}

fn put_huffman_table(out: &mut Vec<u8>, codelens: &[u8; 16], symbols: &[u8], class: u8, id: u8) {
    let len = (3 + 16 + symbols.len()) as u16;
    out.extend_from_slice(&[0xff, 0xc4]);
    out.extend_from_slice(&len.to_be_bytes());
    out.push(class << 4 | id);
    out.extend_from_slice(codelens);
    out.extend_from_slice(symbols);
}

/// Write a complete baseline JPEG header. `width8`/`height8` are the RTP
/// payload header's dimensions in units of 8 pixels; `frame_type` selects
/// the chroma sampling factors.
pub fn write_header(out: &mut Vec<u8>, frame_type: u8, width8: u8, height8: u8, qtable: &[u8; 64]) {
    let width = u16::from(width8) * 8;
    let height = u16::from(height8) * 8;

    out.extend_from_slice(&[0xff, 0xd8]); // SOI

    put_quant_table(out, qtable, 0);
    put_quant_table(out, qtable, 1);

    // SOF0, three components; luma sampling depends on the frame type.
    let lum_sampling: u8 = if frame_type == 0 { 0x21 } else { 0x22 };
    out.extend_from_slice(&[0xff, 0xc0, 0x00, 17, 8]);
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[3, 0, lum_sampling, 0, 1, 0x11, 1, 2, 0x11, 1]);

    put_huffman_table(out, &LUM_DC_CODELENS, &LUM_DC_SYMBOLS, 0, 0);
    put_huffman_table(out, &LUM_AC_CODELENS, &LUM_AC_SYMBOLS, 1, 0);
    put_huffman_table(out, &CHM_DC_CODELENS, &CHM_DC_SYMBOLS, 0, 1);
    put_huffman_table(out, &CHM_AC_CODELENS, &CHM_AC_SYMBOLS, 1, 1);

    // SOS
    out.extend_from_slice(&[0xff, 0xda, 0x00, 12, 3, 0, 0x00, 1, 0x11, 2, 0x11, 0, 63, 0]);
}
