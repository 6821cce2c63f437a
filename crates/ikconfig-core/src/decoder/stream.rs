//! Member-by-member decoding of compressed streams.
//!
//! gzip and bzip2 files may hold several concatenated members (pigz,
//! pbzip2, `cat a.gz b.gz`), and an image embedded in a bzImage is followed
//! by unrelated bytes. Each decoder here consumes exactly one member and
//! hands back the unread tail, so callers can either continue with the next
//! member or stop at trailing data.

use super::CompressionFormat;
use crate::scanner::has_prefix;
use std::io::{self, Read};
use tracing::trace;
use xz2::stream::{Action, Status, Stream};

/// Output growth step for the xz decoder
const XZ_CHUNK: usize = 64 * 1024;

/// Decode every consecutive member of `input`.
///
/// Decoding stops at the end of input or at the first byte run that does not
/// start with the format's signature. A malformed or truncated member is an
/// error, never a short result.
pub(super) fn decode_stream(format: CompressionFormat, input: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = input;
    let mut members = 0usize;

    loop {
        let remaining = decode_member(format, rest, &mut out)?;
        members += 1;
        if remaining.len() == rest.len() {
            break;
        }
        rest = remaining;

        match format.signature() {
            Some(signature) if has_prefix(rest, signature) => continue,
            _ => break,
        }
    }

    if !rest.is_empty() {
        trace!(
            "Ignoring {} trailing bytes after {} {} member(s)",
            rest.len(),
            members,
            format
        );
    }
    Ok(out)
}

/// Decode a single member, appending to `out` and returning the unread tail
pub(super) fn decode_member<'a>(
    format: CompressionFormat,
    input: &'a [u8],
    out: &mut Vec<u8>,
) -> io::Result<&'a [u8]> {
    match format {
        CompressionFormat::Gzip => {
            let mut decoder = flate2::bufread::GzDecoder::new(input);
            decoder.read_to_end(out)?;
            Ok(decoder.into_inner())
        }
        CompressionFormat::Bzip2 => {
            let mut decoder = bzip2::bufread::BzDecoder::new(input);
            decoder.read_to_end(out)?;
            Ok(decoder.into_inner())
        }
        CompressionFormat::Xz => decode_xz_member(input, out),
        CompressionFormat::Zstd => {
            let mut decoder = zstd::stream::read::Decoder::with_buffer(input)?.single_frame();
            decoder.read_to_end(out)?;
            Ok(decoder.finish())
        }
        other => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no stream decoder for {}", other),
        )),
    }
}

/// The buffered xz reader rejects bytes after the stream end, so drive the
/// liblzma stream directly and stop at `StreamEnd`.
fn decode_xz_member<'a>(input: &'a [u8], out: &mut Vec<u8>) -> io::Result<&'a [u8]> {
    let mut stream = Stream::new_stream_decoder(u64::MAX, 0).map_err(invalid_data)?;

    loop {
        let consumed = stream.total_in() as usize;
        let before = (stream.total_in(), stream.total_out());
        if out.capacity() - out.len() < XZ_CHUNK {
            out.reserve(XZ_CHUNK);
        }

        let action = if consumed == input.len() {
            Action::Finish
        } else {
            Action::Run
        };
        let status = stream
            .process_vec(&input[consumed..], out, action)
            .map_err(invalid_data)?;

        if status == Status::StreamEnd {
            return Ok(&input[stream.total_in() as usize..]);
        }
        if (stream.total_in(), stream.total_out()) == before {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "xz stream ended before its end marker",
            ));
        }
    }
}

fn invalid_data(e: xz2::stream::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn bzip2(data: &[u8]) -> Vec<u8> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zstd(data: &[u8]) -> Vec<u8> {
        zstd::encode_all(data, 3).unwrap()
    }

    fn encoders() -> [(CompressionFormat, fn(&[u8]) -> Vec<u8>); 4] {
        [
            (CompressionFormat::Gzip, gzip),
            (CompressionFormat::Bzip2, bzip2),
            (CompressionFormat::Xz, xz),
            (CompressionFormat::Zstd, zstd),
        ]
    }

    #[test]
    fn test_concatenated_members_decode_completely() {
        for (format, encode) in encoders() {
            let mut input = encode(b"first-");
            input.extend_from_slice(&encode(b"second"));

            let decoded = decode_stream(format, &input).unwrap();
            assert_eq!(decoded, b"first-second", "{format}");
        }
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        for (format, encode) in encoders() {
            let mut input = encode(b"payload");
            input.extend_from_slice(b"\x00\x00\x00\x00IKCFG_ED trailing setup data");

            let decoded = decode_stream(format, &input).unwrap();
            assert_eq!(decoded, b"payload", "{format}");
        }
    }

    #[test]
    fn test_member_returns_unread_tail() {
        for (format, encode) in encoders() {
            let mut input = encode(b"one");
            input.extend_from_slice(b"tail");

            let mut out = Vec::new();
            let rest = decode_member(format, &input, &mut out).unwrap();
            assert_eq!(out, b"one", "{format}");
            assert_eq!(rest, b"tail", "{format}");
        }
    }

    #[test]
    fn test_truncated_member_is_error() {
        let data: Vec<u8> = (0..64 * 1024u32).map(|i| (i * 31 % 253) as u8).collect();
        for (format, encode) in encoders() {
            let mut input = encode(&data);
            input.truncate(input.len() / 2);
            assert!(decode_stream(format, &input).is_err(), "{format}");
        }
    }

    #[test]
    fn test_truncated_second_member_is_error() {
        let mut input = gzip(b"first-");
        let second = gzip(&[b'z'; 8192]);
        input.extend_from_slice(&second[..second.len() - 4]);
        assert!(decode_stream(CompressionFormat::Gzip, &input).is_err());
    }

    #[test]
    fn test_unsupported_member_format() {
        let err = decode_member(CompressionFormat::Lz4, b"data", &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
