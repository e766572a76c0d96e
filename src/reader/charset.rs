use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};

const SNIFF_LEN: usize = 4096;

pub fn detect_encoding_from_buffer(buffer: &[u8], complete: bool,) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(buffer, complete,);
    detector.guess(None, true,)
}

/// Wraps `file` in a reader that yields UTF-8, guessing the source encoding from its first
/// bytes. A byte-order mark, when present, takes precedence over the guess.
pub fn get_decoded_reader(mut file: File,) -> std::io::Result<DecodeReaderBytes<File, Vec<u8,>,>,> {
    let mut buffer = [0u8; SNIFF_LEN];
    let bytes_read = file.read(&mut buffer,)?;
    let encoding = detect_encoding_from_buffer(&buffer[..bytes_read], bytes_read < SNIFF_LEN,);
    tracing::debug!("detected {} encoding", encoding.name());

    file.seek(SeekFrom::Start(0,),)?;
    Ok(DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding,),)
        .build(file,),)
}
