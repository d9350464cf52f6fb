use super::{LoadError, LoadReport, LoadWarning, PointCloudLoader};
use crate::config::LoaderOptions;
use crate::format::{
    expected_file_size, records_available, FileHeader, BINARY_EXTENSION, HEADER_SIZE,
    MAX_POINT_COUNT, POINT_STRIDE,
};
use crate::point::PointRecord;
use crate::point_cloud::PointCollection;
use async_trait::async_trait;
use binrw::BinReaderExt;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;
use tracing::{debug, error, info, span, warn, Instrument, Level, Span};

/// How record bytes become [`PointRecord`]s.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DecodeStrategy {
    /// Field by field reads from a buffered stream. Works on any platform.
    Streamed,
    /// Whole file read into memory, record bytes copied straight into the point array.
    /// Only valid where the native layout equals the wire layout.
    Bulk,
}

impl DecodeStrategy {
    pub const fn is_supported(self) -> bool {
        match self {
            DecodeStrategy::Streamed => true,
            DecodeStrategy::Bulk => native_layout_matches_wire(),
        }
    }

    pub const fn preferred() -> Self {
        if native_layout_matches_wire() {
            DecodeStrategy::Bulk
        } else {
            DecodeStrategy::Streamed
        }
    }
}

/// Size, alignment and field offsets of [`PointRecord`] are asserted at compile time,
/// byte order is the remaining condition.
pub const fn native_layout_matches_wire() -> bool {
    cfg!(target_endian = "little")
}

/// Loader for the fixed `u32 count + count * 16 byte record` format.
///
/// The decode strategy is fixed when the loader is built and never changes afterwards.
///
/// `load_async` and `load_report_async` run on the tokio blocking pool and must be awaited
/// inside a tokio runtime.
#[derive(Clone, Debug)]
pub struct BinaryLoader {
    options: LoaderOptions,
}

impl Default for BinaryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryLoader {
    /// Loader using [`DecodeStrategy::preferred`].
    pub fn new() -> Self {
        Self {
            options: LoaderOptions::default(),
        }
    }

    /// Fails with [`LoadError::LayoutAssumptionViolated`] when the requested strategy
    /// cannot run on this platform, and with [`LoadError::Config`] on invalid options.
    pub fn with_options(options: LoaderOptions) -> Result<Self, LoadError> {
        let options = options.validated()?;
        if !options.strategy.is_supported() {
            return Err(LoadError::LayoutAssumptionViolated);
        }

        Ok(Self { options })
    }

    pub fn streamed() -> Self {
        Self {
            options: LoaderOptions::default().with_strategy(DecodeStrategy::Streamed),
        }
    }

    pub fn bulk() -> Result<Self, LoadError> {
        Self::with_options(LoaderOptions::default().with_strategy(DecodeStrategy::Bulk))
    }

    pub fn strategy(&self) -> DecodeStrategy {
        self.options.strategy
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    fn limit(&self) -> u32 {
        self.options.max_points.min(MAX_POINT_COUNT)
    }

    fn span(&self, path: &Path) -> Span {
        span!(
            Level::DEBUG,
            "load_points",
            path = %path.display(),
            strategy = ?self.strategy()
        )
    }

    pub fn load_report(&self, path: &Path) -> Result<LoadReport, LoadError> {
        let span = self.span(path);
        let _enter = span.enter();

        let result = match self.strategy() {
            DecodeStrategy::Streamed => self.decode_file(path),
            DecodeStrategy::Bulk => read_file(path).and_then(|bytes| self.decode_bytes(&bytes)),
        };

        log_outcome(&result);
        result
    }

    /// Reading and decoding happen on the blocking pool. For the bulk strategy the decode
    /// stage is only scheduled once every byte has been read.
    pub async fn load_report_async(&self, path: &Path) -> Result<LoadReport, LoadError> {
        let span = self.span(path);
        let path = path.to_path_buf();
        let this = self.clone();

        async move {
            let result = match this.strategy() {
                DecodeStrategy::Streamed => {
                    let span = Span::current();
                    run_blocking(move || span.in_scope(|| this.decode_file(&path))).await
                }
                DecodeStrategy::Bulk => match read_file_async(&path).await {
                    Ok(bytes) => {
                        let span = Span::current();
                        run_blocking(move || span.in_scope(|| this.decode_bytes(&bytes))).await
                    }
                    Err(err) => Err(err),
                },
            };

            log_outcome(&result);
            result
        }
        .instrument(span)
        .await
    }

    /// Bulk decoder over a complete file image (header included).
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<LoadReport, LoadError> {
        if !native_layout_matches_wire() {
            return Err(LoadError::LayoutAssumptionViolated);
        }

        if bytes.len() < HEADER_SIZE {
            return Err(LoadError::Decode {
                offset: 0,
                reason: format!("{} bytes cannot hold the point count header", bytes.len()),
            });
        }

        let declared = LittleEndian::read_u32(&bytes[..HEADER_SIZE]);
        let plan = ReadPlan::new(declared, bytes.len() as u64, self.limit())?;

        let body = &bytes[HEADER_SIZE..HEADER_SIZE + plan.records * POINT_STRIDE];
        let points: Vec<PointRecord> = bytemuck::pod_collect_to_vec(body);

        Ok(plan.finish(points))
    }

    /// Streamed decoder. `stream_len` is the total length of the source, header included,
    /// and decides how many records are attempted.
    pub fn decode_stream<R: Read + Seek>(
        &self,
        mut reader: R,
        stream_len: u64,
    ) -> Result<LoadReport, LoadError> {
        let header: FileHeader = reader.read_le().map_err(|err| decode_error(err, 0))?;
        let plan = ReadPlan::new(header.point_count, stream_len, self.limit())?;

        let mut points = Vec::with_capacity(plan.records);
        for index in 0..plan.records {
            let point: PointRecord = reader
                .read_le()
                .map_err(|err| decode_error(err, record_offset(index)))?;
            points.push(point);
        }

        Ok(plan.finish(points))
    }

    fn decode_file(&self, path: &Path) -> Result<LoadReport, LoadError> {
        let file = open_file(path)?;
        let file_len = file.metadata()?.len();
        let reader = BufReader::with_capacity(self.options.buffer_capacity, file);

        self.decode_stream(reader, file_len)
    }
}

#[async_trait]
impl PointCloudLoader for BinaryLoader {
    fn name(&self) -> &str {
        "Binary point cloud"
    }

    fn supported_extensions(&self) -> &[&str] {
        &[BINARY_EXTENSION]
    }

    fn load(&self, path: &Path) -> Result<PointCollection, LoadError> {
        self.load_report(path).map(LoadReport::into_collection)
    }

    async fn load_async(&self, path: &Path) -> Result<PointCollection, LoadError> {
        self.load_report_async(path)
            .await
            .map(LoadReport::into_collection)
    }
}

/// What a header and the actual source length allow us to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadPlan {
    declared: u32,
    records: usize,
    expected_len: u64,
    actual_len: u64,
}

impl ReadPlan {
    fn new(declared: u32, actual_len: u64, limit: u32) -> Result<Self, LoadError> {
        if declared > limit {
            return Err(LoadError::CountExceedsLimit {
                count: declared,
                limit,
            });
        }

        let records = records_available(actual_len).min(declared as u64) as usize;
        let plan = Self {
            declared,
            records,
            expected_len: expected_file_size(declared),
            actual_len,
        };

        debug!(
            declared = plan.declared,
            records = plan.records,
            expected_len = plan.expected_len,
            actual_len = plan.actual_len,
            "read plan"
        );

        Ok(plan)
    }

    fn size_warning(&self) -> Option<LoadWarning> {
        (self.expected_len != self.actual_len).then(|| LoadWarning::SizeMismatch {
            expected: self.expected_len,
            actual: self.actual_len,
        })
    }

    fn finish(&self, points: Vec<PointRecord>) -> LoadReport {
        let warnings: Vec<_> = self.size_warning().into_iter().collect();
        for warning in &warnings {
            warn!(records = points.len(), "{warning}");
        }

        LoadReport {
            collection: PointCollection::new(points),
            warnings,
        }
    }
}

fn record_offset(index: usize) -> u64 {
    (HEADER_SIZE + index * POINT_STRIDE) as u64
}

fn decode_error(err: binrw::Error, offset: u64) -> LoadError {
    if err.is_eof() {
        return LoadError::Decode {
            offset,
            reason: "unexpected end of data".to_string(),
        };
    }

    match err.root_cause() {
        binrw::Error::Io(io) => LoadError::Io(io::Error::new(io.kind(), io.to_string())),
        _ => LoadError::Decode {
            offset,
            reason: err.to_string(),
        },
    }
}

fn open_error(path: &Path, err: io::Error) -> LoadError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            LoadError::FileNotFound(path.to_path_buf())
        }
        _ => LoadError::Io(err),
    }
}

fn open_file(path: &Path) -> Result<File, LoadError> {
    if !path.is_file() {
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }

    File::open(path).map_err(|err| open_error(path, err))
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.is_file() {
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }

    std::fs::read(path).map_err(|err| open_error(path, err))
}

async fn read_file_async(path: &Path) -> Result<Vec<u8>, LoadError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => return Err(LoadError::FileNotFound(path.to_path_buf())),
    }

    tokio::fs::read(path)
        .await
        .map_err(|err| open_error(path, err))
}

async fn run_blocking<T, F>(task: F) -> Result<T, LoadError>
where
    F: FnOnce() -> Result<T, LoadError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| LoadError::Worker(err.to_string()))?
}

fn log_outcome(result: &Result<LoadReport, LoadError>) {
    match result {
        Ok(report) => info!(
            points = report.collection.len(),
            bytes = report.collection.memory_footprint(),
            warnings = report.warnings.len(),
            "point cloud loaded"
        ),
        Err(err) => error!(%err, "point cloud load failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::format::{encode_points, save_points};
    use glam::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn loaders() -> Vec<BinaryLoader> {
        vec![BinaryLoader::streamed(), BinaryLoader::bulk().unwrap()]
    }

    fn fixture(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn random_points(n: usize, seed: u64) -> Vec<PointRecord> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                PointRecord::new(
                    rng.gen_range(-1.0e6..1.0e6),
                    rng.gen_range(-1.0e6..1.0e6),
                    rng.gen_range(-1.0e6..1.0e6),
                    rng.gen(),
                )
            })
            .collect()
    }

    fn three_points() -> Vec<PointRecord> {
        vec![
            PointRecord::new(0.0, 0.0, 0.0, 0xFF00_0000),
            PointRecord::new(1.0, 1.0, 1.0, 0x00FF_0000),
            PointRecord::new(-1.0, 2.0, 0.0, 0x0000_FF00),
        ]
    }

    #[test]
    fn three_point_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.bin");
        save_points(&path, &three_points()).unwrap();

        for loader in loaders() {
            let report = loader.load_report(&path).unwrap();
            let pc = &report.collection;

            assert!(report.is_clean());
            assert_eq!(pc.len(), 3);
            assert_eq!(pc.bounds().min, Vec3::new(-1.0, 0.0, 0.0));
            assert_eq!(pc.bounds().max, Vec3::new(1.0, 2.0, 1.0));
            assert_eq!(pc.bounds().center(), Vec3::new(0.0, 1.0, 0.5));
            assert_eq!(pc.points(), three_points().as_slice());
        }
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let points = random_points(1000, 42);
        let bytes = encode_points(&points).unwrap();
        let expected: &[u8] = bytemuck::cast_slice(points.as_slice());

        let streamed = BinaryLoader::streamed()
            .decode_stream(Cursor::new(&bytes), bytes.len() as u64)
            .unwrap();
        assert_eq!(bytemuck::cast_slice::<PointRecord, u8>(streamed.collection.points()), expected);

        let bulk = BinaryLoader::bulk().unwrap().decode_bytes(&bytes).unwrap();
        assert_eq!(bytemuck::cast_slice::<PointRecord, u8>(bulk.collection.points()), expected);
    }

    /// Serves the first `ok_bytes` of `inner`, then fails every call with a non-EOF error.
    struct FailingReader {
        inner: Cursor<Vec<u8>>,
        ok_bytes: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let remaining = self.ok_bytes.saturating_sub(self.inner.position());
            if remaining == 0 {
                return Err(io::Error::other("device went away"));
            }
            let len = buf.len().min(remaining as usize);
            self.inner.read(&mut buf[..len])
        }
    }

    impl Seek for FailingReader {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn failing_reader_is_an_io_failure() {
        let bytes = encode_points(&three_points()).unwrap();
        let len = bytes.len() as u64;
        let loader = BinaryLoader::streamed();

        for ok_bytes in [0, 2, 24] {
            let reader = FailingReader {
                inner: Cursor::new(bytes.clone()),
                ok_bytes,
            };

            let err = loader.decode_stream(reader, len).unwrap_err();
            assert!(
                matches!(&err, LoadError::Io(source) if source.kind() == io::ErrorKind::Other),
                "failure after {ok_bytes} bytes: {err:?}"
            );
        }
    }

    #[test]
    fn invalid_options_are_rejected() {
        let options = LoaderOptions {
            buffer_capacity: 0,
            ..LoaderOptions::default()
        };
        assert!(matches!(
            BinaryLoader::with_options(options),
            Err(LoadError::Config(ConfigError::ZeroBufferCapacity))
        ));

        let options = LoaderOptions::default()
            .with_strategy(DecodeStrategy::Streamed)
            .with_max_points(u32::MAX);
        let loader = BinaryLoader::with_options(options).unwrap();
        assert_eq!(loader.options().max_points, MAX_POINT_COUNT);
    }

    #[test]
    fn well_formed_files_decode_every_record() {
        let dir = tempfile::tempdir().unwrap();

        for n in [0usize, 1, 2, 17, 256, 4099] {
            let points = random_points(n, n as u64);
            let path = dir.path().join(format!("{n}.bin"));
            save_points(&path, &points).unwrap();

            for loader in loaders() {
                let report = loader.load_report(&path).unwrap();
                assert!(report.is_clean());
                assert_eq!(report.collection.len(), n);
                assert_eq!(report.collection.points(), points.as_slice());
            }
        }
    }

    #[test]
    fn count_above_limit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let header_only = fixture(&dir, "huge.bin", &(MAX_POINT_COUNT + 1).to_le_bytes());

        let mut with_body = (MAX_POINT_COUNT + 1).to_le_bytes().to_vec();
        with_body.extend(encode_points(&three_points()).unwrap().split_off(HEADER_SIZE));
        let with_body = fixture(&dir, "huge_body.bin", &with_body);

        let max = fixture(&dir, "max.bin", &u32::MAX.to_le_bytes());

        for loader in loaders() {
            for path in [&header_only, &with_body, &max] {
                let err = loader.load(path).unwrap_err();
                assert!(matches!(
                    err,
                    LoadError::CountExceedsLimit { limit: MAX_POINT_COUNT, .. }
                ));
            }
        }
    }

    #[test]
    fn configured_limit() {
        let bytes = encode_points(&three_points()).unwrap();
        let options = LoaderOptions::default()
            .with_strategy(DecodeStrategy::Streamed)
            .with_max_points(2);
        let loader = BinaryLoader::with_options(options).unwrap();

        let err = loader
            .decode_stream(Cursor::new(&bytes), bytes.len() as u64)
            .unwrap_err();
        assert!(matches!(err, LoadError::CountExceedsLimit { count: 3, limit: 2 }));
    }

    #[test]
    fn short_file_yields_complete_records_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = encode_points(&three_points()).unwrap();
        // two full records and half of the third
        bytes.truncate(HEADER_SIZE + 2 * POINT_STRIDE + 8);
        let path = fixture(&dir, "short.bin", &bytes);

        for loader in loaders() {
            let report = loader.load_report(&path).unwrap();

            assert_eq!(report.collection.points(), &three_points()[..2]);
            assert_eq!(
                report.warnings,
                vec![LoadWarning::SizeMismatch {
                    expected: 52,
                    actual: 44
                }]
            );
        }
    }

    #[test]
    fn header_without_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "empty_body.bin", &10u32.to_le_bytes());

        for loader in loaders() {
            let report = loader.load_report(&path).unwrap();

            assert!(report.collection.is_empty());
            assert_eq!(*report.collection.bounds(), crate::bounds::Aabb::ZERO);
            assert_eq!(report.warnings.len(), 1);
        }
    }

    #[test]
    fn trailing_bytes_are_ignored_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = encode_points(&three_points()).unwrap();
        bytes.extend_from_slice(&[0xAB; 21]);
        let path = fixture(&dir, "long.bin", &bytes);

        for loader in loaders() {
            let report = loader.load_report(&path).unwrap();

            assert_eq!(report.collection.points(), three_points().as_slice());
            assert_eq!(
                report.warnings,
                vec![LoadWarning::SizeMismatch {
                    expected: 52,
                    actual: 73
                }]
            );
        }
    }

    #[test]
    fn truncated_header_is_a_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "tiny.bin", &[1, 0]);

        for loader in loaders() {
            let err = loader.load(&path).unwrap_err();
            assert!(matches!(err, LoadError::Decode { offset: 0, .. }));
        }
    }

    #[test]
    fn stream_ending_mid_record_is_a_decode_failure() {
        let bytes = encode_points(&three_points()).unwrap();
        let cut = &bytes[..HEADER_SIZE + POINT_STRIDE + 6];

        // length claims a complete file, the stream runs dry inside record 1
        let err = BinaryLoader::streamed()
            .decode_stream(Cursor::new(cut), bytes.len() as u64)
            .unwrap_err();
        assert!(matches!(err, LoadError::Decode { offset: 20, .. }));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bin");

        for loader in loaders() {
            for path in [missing.as_path(), Path::new(""), dir.path()] {
                let err = loader.load(path).unwrap_err();
                assert!(matches!(err, LoadError::FileNotFound(_)), "{path:?}: {err}");
            }
        }
    }

    #[test]
    fn can_load_by_extension() {
        let loader = BinaryLoader::new();

        assert!(loader.can_load(Path::new("scan.bin")));
        assert!(loader.can_load(Path::new("/data/SCAN.BIN")));
        assert!(loader.can_load(Path::new("scan.Bin")));
        assert!(!loader.can_load(Path::new("")));
        assert!(!loader.can_load(Path::new("scan.ply")));
        assert!(!loader.can_load(Path::new("bin")));
        assert!(!loader.can_load(Path::new("scan.bin.gz")));
        assert!(!loader.can_load(Path::new("scan.")));
        assert!(loader.can_load(Path::new(".bin")));
        assert!(loader.can_load(Path::new("dir/.BIN")));
        assert!(loader.can_load(Path::new("archive.tar.bin")));
        assert_eq!(loader.supported_extensions(), &[".bin"]);
    }

    #[test]
    fn strategy_selection() {
        assert!(DecodeStrategy::Streamed.is_supported());
        assert_eq!(
            DecodeStrategy::Bulk.is_supported(),
            cfg!(target_endian = "little")
        );
        assert_eq!(BinaryLoader::new().strategy(), DecodeStrategy::preferred());
        assert_eq!(BinaryLoader::streamed().strategy(), DecodeStrategy::Streamed);

        let bulk = LoaderOptions::default().with_strategy(DecodeStrategy::Bulk);
        if cfg!(target_endian = "little") {
            assert_eq!(
                BinaryLoader::with_options(bulk).unwrap().strategy(),
                DecodeStrategy::Bulk
            );
        } else {
            assert!(matches!(
                BinaryLoader::with_options(bulk),
                Err(LoadError::LayoutAssumptionViolated)
            ));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_matches_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let points = random_points(5000, 9);
        let path = dir.path().join("async.bin");
        save_points(&path, &points).unwrap();

        for loader in loaders() {
            let blocking = loader.load(&path).unwrap();
            let non_blocking = loader.load_async(&path).await.unwrap();
            assert_eq!(blocking, non_blocking);
        }
    }

    #[tokio::test]
    async fn async_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bin");
        let huge = fixture(&dir, "huge.bin", &u32::MAX.to_le_bytes());

        for loader in loaders() {
            assert!(matches!(
                loader.load_async(&missing).await,
                Err(LoadError::FileNotFound(_))
            ));
            assert!(matches!(
                loader.load_async(&huge).await,
                Err(LoadError::CountExceedsLimit { .. })
            ));
        }
    }
}
