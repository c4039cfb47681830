use crate::compression::parquet_codec;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use records2s3_config::Compression;

const DEFAULT_ROW_GROUP_SIZE: usize = 32 * 1024;

/// Writer properties for one Parquet object
///
/// - Dictionary encoding enabled
/// - Page-level statistics
/// - 32k rows per group
/// - Source stream and writer version embedded in file metadata
pub(crate) fn writer_properties(compression: Compression, stream_name: &str) -> WriterProperties {
    let metadata = vec![
        KeyValue {
            key: "records2s3.version".to_string(),
            value: Some(env!("CARGO_PKG_VERSION").to_string()),
        },
        KeyValue {
            key: "records2s3.stream".to_string(),
            value: Some(stream_name.to_string()),
        },
    ];

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(parquet_codec(compression))
        .set_data_page_size_limit(256 * 1024)
        .set_max_row_group_size(DEFAULT_ROW_GROUP_SIZE)
        .set_key_value_metadata(Some(metadata))
        .build()
}
