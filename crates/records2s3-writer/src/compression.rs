//! Object body compression

use flate2::write::GzEncoder;
use parquet::basic::{GzipLevel, ZstdLevel};
use records2s3_config::Compression;
use std::io::{self, Write};

const ZSTD_LEVEL: i32 = 3;

/// Compress an encoded body with the configured codec
pub(crate) fn compress(codec: Compression, raw: &[u8]) -> io::Result<Vec<u8>> {
    match codec {
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(raw)?;
            encoder.finish()
        }
        Compression::Zstd => zstd::encode_all(raw, ZSTD_LEVEL),
    }
}

/// Parquet applies the codec per column chunk instead of to the whole file
pub(crate) fn parquet_codec(codec: Compression) -> parquet::basic::Compression {
    match codec {
        Compression::Gzip => parquet::basic::Compression::GZIP(GzipLevel::default()),
        Compression::Zstd => parquet::basic::Compression::ZSTD(ZstdLevel::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_gzip_is_readable() {
        let body = compress(Compression::Gzip, b"{\"id\":1}\n").unwrap();
        assert_eq!(&body[..2], &[0x1f, 0x8b]);

        let mut decoded = String::new();
        flate2::read::GzDecoder::new(body.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "{\"id\":1}\n");
    }

    #[test]
    fn test_zstd_is_readable() {
        let body = compress(Compression::Zstd, b"a,b\n1,2\n").unwrap();
        let decoded = zstd::decode_all(body.as_slice()).unwrap();
        assert_eq!(decoded, b"a,b\n1,2\n");
    }

    #[test]
    fn test_parquet_codec_mapping() {
        assert!(matches!(
            parquet_codec(Compression::Gzip),
            parquet::basic::Compression::GZIP(_)
        ));
        assert!(matches!(
            parquet_codec(Compression::Zstd),
            parquet::basic::Compression::ZSTD(_)
        ));
    }
}
