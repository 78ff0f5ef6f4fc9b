//! Builders for backend replies used across the filter tests

use bytes::{BufMut, BytesMut};

use super::state::Reply;
use crate::protocol::lenenc::write_lenenc_int;
use crate::protocol::packet::MAX_PACKET_SIZE;
use crate::protocol::Packet;

pub fn push_packet(buf: &mut Vec<u8>, sequence_id: u8, payload: &[u8]) {
    let len = payload.len();
    buf.push((len & 0xFF) as u8);
    buf.push(((len >> 8) & 0xFF) as u8);
    buf.push(((len >> 16) & 0xFF) as u8);
    buf.push(sequence_id);
    buf.extend_from_slice(payload);
}

/// Write a payload that may exceed the frame limit, returning the next sequence id
pub fn push_split_row(buf: &mut Vec<u8>, sequence_id: u8, payload: &[u8]) -> u8 {
    let mut seq = sequence_id;
    let mut rest = payload;
    loop {
        let n = rest.len().min(MAX_PACKET_SIZE);
        push_packet(buf, seq, &rest[..n]);
        seq = seq.wrapping_add(1);
        rest = &rest[n..];
        if n < MAX_PACKET_SIZE {
            return seq;
        }
    }
}

fn put_lenenc_str(buf: &mut BytesMut, value: &[u8]) {
    write_lenenc_int(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

pub fn column_definition(name: &str) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_lenenc_str(&mut buf, b"def");
    put_lenenc_str(&mut buf, b"test");
    put_lenenc_str(&mut buf, b"t");
    put_lenenc_str(&mut buf, b"t");
    put_lenenc_str(&mut buf, name.as_bytes());
    put_lenenc_str(&mut buf, name.as_bytes());
    buf.put_u8(0x0c);
    buf.put_u16_le(0x21);
    buf.put_u32_le(255);
    buf.put_u8(0xfd); // VAR_STRING
    buf.put_u16_le(0);
    buf.put_u8(0);
    buf.put_u16_le(0);
    buf.to_vec()
}

pub fn text_row<T: AsRef<[u8]>>(values: &[T]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for value in values {
        put_lenenc_str(&mut buf, value.as_ref());
    }
    buf.to_vec()
}

pub fn eof_payload(status: u16) -> Vec<u8> {
    let mut payload = vec![0xFE, 0x00, 0x00];
    payload.extend_from_slice(&status.to_le_bytes());
    payload
}

pub fn ok_packet(sequence_id: u8, status: u16) -> Vec<u8> {
    let mut payload = vec![0x00, 0x00, 0x00];
    payload.extend_from_slice(&status.to_le_bytes());
    payload.extend_from_slice(&[0x00, 0x00]);
    let mut buf = Vec::new();
    push_packet(&mut buf, sequence_id, &payload);
    buf
}

/// A complete text resultset whose last EOF carries `final_status`
pub fn resultset(fields: usize, rows: usize, final_status: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut seq = 1u8;
    let mut next = |buf: &mut Vec<u8>, payload: &[u8]| {
        push_packet(buf, seq, payload);
        seq = seq.wrapping_add(1);
    };

    next(&mut buf, &[fields as u8]);
    for i in 0..fields {
        next(&mut buf, &column_definition(&format!("c{}", i)));
    }
    next(&mut buf, &eof_payload(0));
    for row in 0..rows {
        let values: Vec<String> = (0..fields).map(|col| format!("r{}c{}", row, col)).collect();
        next(&mut buf, &text_row(&values));
    }
    next(&mut buf, &eof_payload(final_status));
    buf
}

pub fn query_packet(sql: &str) -> Packet {
    let mut payload = vec![0x03];
    payload.extend_from_slice(sql.as_bytes());
    Packet::new(0, payload)
}

pub fn concat(replies: Vec<Reply>) -> Vec<u8> {
    replies
        .into_iter()
        .flat_map(|reply| reply.into_bytes().to_vec())
        .collect()
}
