//! PDF post-processing through external tools.
//!
//! [`PdfProcessor`] treats the PDF as an opaque byte buffer and delegates
//! all format work to `qpdf` (encryption, merging, page selection,
//! rotation, page counts) and Ghostscript (compression). Every call works
//! in its own temporary directory, so calls may run concurrently.
//!
//! | Operation | Tool |
//! |-----------|------|
//! | [`encrypt`](PdfProcessor::encrypt) | `qpdf --encrypt` |
//! | [`merge`](PdfProcessor::merge) | `qpdf --empty --pages` |
//! | [`page_count`](PdfProcessor::page_count) | `qpdf --show-npages` |
//! | [`extract`](PdfProcessor::extract) / [`split`](PdfProcessor::split) / [`reorder`](PdfProcessor::reorder) | `qpdf --pages` |
//! | [`rotate`](PdfProcessor::rotate) | `qpdf --rotate` |
//! | [`compress`](PdfProcessor::compress) | `gs -sDEVICE=pdfwrite` |
//!
//! All methods block; call them from `spawn_blocking`. Every tool run is
//! killed once it exceeds the runner's timeout
//! ([`DEFAULT_TOOL_TIMEOUT`] by default).

mod runner;

pub use runner::{CommandOutput, CommandRunner, DEFAULT_TOOL_TIMEOUT, SystemCommandRunner};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::error::{ConversionError, Result};

const QPDF: &str = "qpdf";
const GHOSTSCRIPT: &str = "gs";

/// qpdf exits with 3 when it succeeded with warnings.
const QPDF_WARNING_EXIT: i32 = 3;

fn default_encryption_bits() -> u16 {
    256
}

/// Password protection and permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfSecurity {
    #[serde(default)]
    pub user_password: String,
    #[serde(default)]
    pub owner_password: String,
    #[serde(default)]
    pub allow_printing: bool,
    #[serde(default)]
    pub allow_copying: bool,
    #[serde(default)]
    pub allow_modifying: bool,
    /// 128 or 256; anything else encrypts with 256.
    #[serde(default = "default_encryption_bits")]
    pub encryption_bits: u16,
}

impl PdfSecurity {
    /// Whether applying this would change the document.
    pub fn is_active(&self) -> bool {
        !self.user_password.is_empty() || !self.owner_password.is_empty()
    }

    fn key_bits(&self) -> u16 {
        if self.encryption_bits == 128 { 128 } else { 256 }
    }

    fn validate(&self) -> Result<()> {
        let has_line_break = |p: &str| p.contains(['\n', '\r']);
        if has_line_break(&self.user_password) || has_line_break(&self.owner_password) {
            return Err(ConversionError::InvalidRequest(
                "passwords must not contain line breaks".to_string(),
            ));
        }
        Ok(())
    }

    /// qpdf arguments between `--encrypt` and `--`.
    fn qpdf_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--user-password={}", self.user_password),
            format!("--owner-password={}", self.owner_password),
            format!("--bits={}", self.key_bits()),
        ];

        if self.key_bits() == 256 {
            args.push(if self.allow_printing { "--print=full" } else { "--print=none" }.into());
            args.push(if self.allow_modifying { "--modify=all" } else { "--modify=none" }.into());
            args.push(if self.allow_copying { "--extract=y" } else { "--extract=n" }.into());
        } else {
            if !self.allow_printing {
                args.push("--print=n".into());
            }
            if !self.allow_modifying {
                args.push("--modify=n".into());
            }
            if !self.allow_copying {
                args.push("--extract=n".into());
            }
        }
        args
    }
}

/// How [`PdfProcessor::split`] divides a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    /// One output per page.
    All,
    /// One output per comma-separated range, e.g. `"1-3,5,7-z"`.
    Ranges(String),
    /// Consecutive chunks of `n` pages.
    EveryN(u32),
}

/// Ghostscript quality presets, smallest output first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Screen,
    #[default]
    Ebook,
    Printer,
    Prepress,
}

impl CompressionLevel {
    fn pdf_settings(self) -> &'static str {
        match self {
            CompressionLevel::Screen => "/screen",
            CompressionLevel::Ebook => "/ebook",
            CompressionLevel::Printer => "/printer",
            CompressionLevel::Prepress => "/prepress",
        }
    }
}

/// Output of [`PdfProcessor::compress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    /// Size reduction in whole percent; 0 if the output grew.
    pub savings_percent: u32,
}

/// Check a qpdf page-range expression such as `"1-3,5,8-z"`.
pub fn validate_page_ranges(ranges: &str) -> Result<()> {
    let invalid = || ConversionError::InvalidRequest(format!("invalid page range '{}'", ranges));

    if ranges.trim().is_empty() {
        return Err(invalid());
    }

    for part in ranges.split(',') {
        let part = part.trim();
        for bound in part.splitn(2, '-') {
            let ok = bound == "z"
                || bound.strip_prefix('r').unwrap_or(bound).parse::<u32>().is_ok_and(|n| n > 0);
            if !ok {
                return Err(invalid());
            }
        }
    }
    Ok(())
}

/// Page ranges covering `page_count` pages in chunks of `chunk`.
fn chunk_ranges(page_count: u32, chunk: u32) -> Vec<String> {
    let chunk = chunk.max(1);
    (1..=page_count)
        .step_by(chunk as usize)
        .map(|start| {
            let end = (start + chunk - 1).min(page_count);
            if start == end {
                start.to_string()
            } else {
                format!("{}-{}", start, end)
            }
        })
        .collect()
}

/// Scratch directory for one processor call.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("pdf-forge-")
            .tempdir()
            .map_err(|e| ConversionError::Processing(format!("failed to create temp dir: {}", e)))?;
        Ok(Self { dir })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, bytes)
            .map_err(|e| ConversionError::Processing(format!("failed to write {}: {}", name, e)))?;
        Ok(path)
    }

    /// Write `args` as a qpdf `@argfile`, one argument per line, so they
    /// stay off the process command line.
    fn write_args(&self, name: &str, args: &[String]) -> Result<String> {
        let mut contents = args.join("\n");
        contents.push('\n');
        let path = self.write(name, contents.as_bytes())?;
        Ok(format!("@{}", path_arg(&path)))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            ConversionError::Processing(format!("tool produced no output at {}: {}", path.display(), e))
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Byte-buffer front end to `qpdf` and Ghostscript.
#[derive(Clone)]
pub struct PdfProcessor {
    runner: Arc<dyn CommandRunner>,
}

impl PdfProcessor {
    /// Processor that spawns the real tools.
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SystemCommandRunner::new()))
    }

    /// Processor that spawns the real tools and kills any run longer than
    /// `timeout`.
    pub fn with_tool_timeout(timeout: Duration) -> Self {
        Self::with_runner(Arc::new(SystemCommandRunner::with_timeout(timeout)))
    }

    /// Processor that runs tools through `runner`.
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn qpdf(&self, args: Vec<String>) -> Result<CommandOutput> {
        let output = self.runner.run(QPDF, &args)?;
        match output.code {
            Some(0) | Some(QPDF_WARNING_EXIT) => Ok(output),
            code => {
                log::error!("❌ qpdf failed ({:?}): {}", code, output.stderr.trim());
                Err(ConversionError::Processing(format!(
                    "qpdf exited with {:?}: {}",
                    code,
                    output.stderr.trim()
                )))
            }
        }
    }

    /// Encrypt with `security`. Returns the input unchanged when no
    /// password is set.
    pub fn encrypt(&self, pdf: &[u8], security: &PdfSecurity) -> Result<Vec<u8>> {
        if !security.is_active() {
            return Ok(pdf.to_vec());
        }
        security.validate()?;

        let ws = Workspace::new()?;
        let input = ws.write("input.pdf", pdf)?;
        let output = ws.path("output.pdf");

        let mut encrypt = vec!["--encrypt".to_string()];
        encrypt.extend(security.qpdf_args());
        encrypt.push("--".to_string());

        self.qpdf(vec![
            ws.write_args("encrypt.args", &encrypt)?,
            path_arg(&input),
            path_arg(&output),
        ])?;
        log::debug!("🔒 Encrypted PDF with {}-bit key", security.key_bits());
        ws.read(&output)
    }

    /// Concatenate documents in order.
    pub fn merge(&self, pdfs: &[Vec<u8>]) -> Result<Vec<u8>> {
        if pdfs.len() < 2 {
            return Err(ConversionError::InvalidRequest(
                "at least two PDFs are required to merge".to_string(),
            ));
        }

        let ws = Workspace::new()?;
        let mut args = vec!["--empty".to_string(), "--pages".to_string()];
        for (index, pdf) in pdfs.iter().enumerate() {
            args.push(path_arg(&ws.write(&format!("input-{}.pdf", index), pdf)?));
        }
        let output = ws.path("merged.pdf");
        args.push("--".to_string());
        args.push(path_arg(&output));

        self.qpdf(args)?;
        log::debug!("📎 Merged {} PDFs", pdfs.len());
        ws.read(&output)
    }

    /// Number of pages.
    pub fn page_count(&self, pdf: &[u8]) -> Result<u32> {
        let ws = Workspace::new()?;
        let input = ws.write("input.pdf", pdf)?;

        let output = self.qpdf(vec!["--show-npages".to_string(), path_arg(&input)])?;
        output.stdout.trim().parse().map_err(|_| {
            ConversionError::Processing(format!(
                "unexpected page count output: {:?}",
                output.stdout.trim()
            ))
        })
    }

    /// New document containing only `pages`, e.g. `"1-3,5"`.
    pub fn extract(&self, pdf: &[u8], pages: &str) -> Result<Vec<u8>> {
        validate_page_ranges(pages)?;
        let ws = Workspace::new()?;
        let input = ws.write("input.pdf", pdf)?;
        self.select_pages(&ws, &input, pages, "output.pdf")
    }

    fn select_pages(&self, ws: &Workspace, input: &Path, pages: &str, name: &str) -> Result<Vec<u8>> {
        let output = ws.path(name);
        self.qpdf(vec![
            "--empty".to_string(),
            "--pages".to_string(),
            path_arg(input),
            pages.to_string(),
            "--".to_string(),
            path_arg(&output),
        ])?;
        ws.read(&output)
    }

    /// Split into several documents.
    pub fn split(&self, pdf: &[u8], mode: &SplitMode) -> Result<Vec<Vec<u8>>> {
        let ranges: Vec<String> = match mode {
            SplitMode::All => chunk_ranges(self.page_count(pdf)?, 1),
            SplitMode::EveryN(0) => {
                return Err(ConversionError::InvalidRequest(
                    "split chunk size must be greater than 0".to_string(),
                ));
            }
            SplitMode::EveryN(n) => chunk_ranges(self.page_count(pdf)?, *n),
            SplitMode::Ranges(ranges) => {
                validate_page_ranges(ranges)?;
                ranges.split(',').map(|r| r.trim().to_string()).collect()
            }
        };

        let ws = Workspace::new()?;
        let input = ws.write("input.pdf", pdf)?;
        let parts = ranges
            .iter()
            .enumerate()
            .map(|(index, range)| self.select_pages(&ws, &input, range, &format!("part-{}.pdf", index)))
            .collect::<Result<Vec<_>>>()?;

        log::debug!("✂️ Split PDF into {} parts", parts.len());
        Ok(parts)
    }

    /// Rotate `pages` (all pages when `None`) clockwise by `degrees`.
    pub fn rotate(&self, pdf: &[u8], degrees: i32, pages: Option<&str>) -> Result<Vec<u8>> {
        if !matches!(degrees, 90 | 180 | 270 | -90 | -180 | -270) {
            return Err(ConversionError::InvalidRequest(format!(
                "rotation must be a multiple of 90, got {}",
                degrees
            )));
        }
        let pages = pages.unwrap_or("1-z");
        validate_page_ranges(pages)?;

        let ws = Workspace::new()?;
        let input = ws.write("input.pdf", pdf)?;
        let output = ws.path("output.pdf");
        self.qpdf(vec![
            format!("--rotate={:+}:{}", degrees, pages),
            path_arg(&input),
            path_arg(&output),
        ])?;
        ws.read(&output)
    }

    /// Rearrange pages. `order` lists 1-based page numbers.
    pub fn reorder(&self, pdf: &[u8], order: &[u32]) -> Result<Vec<u8>> {
        if order.is_empty() || order.contains(&0) {
            return Err(ConversionError::InvalidRequest(
                "page order must list 1-based page numbers".to_string(),
            ));
        }
        let pages = order
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let ws = Workspace::new()?;
        let input = ws.write("input.pdf", pdf)?;
        self.select_pages(&ws, &input, &pages, "output.pdf")
    }

    /// Re-encode through Ghostscript at `level`.
    pub fn compress(&self, pdf: &[u8], level: CompressionLevel) -> Result<Compressed> {
        let ws = Workspace::new()?;
        let input = ws.write("input.pdf", pdf)?;
        let output = ws.path("compressed.pdf");

        let args = vec![
            "-sDEVICE=pdfwrite".to_string(),
            "-dCompatibilityLevel=1.4".to_string(),
            format!("-dPDFSETTINGS={}", level.pdf_settings()),
            "-dNOPAUSE".to_string(),
            "-dQUIET".to_string(),
            "-dBATCH".to_string(),
            format!("-sOutputFile={}", path_arg(&output)),
            path_arg(&input),
        ];

        let result = self.runner.run(GHOSTSCRIPT, &args)?;
        if result.code != Some(0) {
            log::error!("❌ Ghostscript failed ({:?}): {}", result.code, result.stderr.trim());
            return Err(ConversionError::Processing(format!(
                "ghostscript exited with {:?}: {}",
                result.code,
                result.stderr.trim()
            )));
        }

        let bytes = ws.read(&output)?;
        let savings_percent = if pdf.is_empty() || bytes.len() >= pdf.len() {
            0
        } else {
            ((pdf.len() - bytes.len()) * 100 / pdf.len()) as u32
        };
        log::debug!(
            "🗜️ Compressed PDF {} -> {} bytes ({}% saved)",
            pdf.len(),
            bytes.len(),
            savings_percent
        );

        Ok(Compressed {
            bytes,
            savings_percent,
        })
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PdfProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfProcessor").finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Pretends to be qpdf/gs: writes a stub PDF wherever output is expected.
    #[derive(Default)]
    struct FakeRunner {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        argfiles: Mutex<Vec<Vec<String>>>,
        pages: u32,
        exit_code: i32,
    }

    impl FakeRunner {
        fn with_pages(pages: u32) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }

        /// Lines of every `@argfile` seen, read while the call ran.
        fn argfiles(&self) -> Vec<Vec<String>> {
            self.argfiles.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
            for path in args.iter().filter_map(|a| a.strip_prefix('@')) {
                let contents = std::fs::read_to_string(path).unwrap();
                self.argfiles
                    .lock()
                    .unwrap()
                    .push(contents.lines().map(str::to_string).collect());
            }

            if self.exit_code != 0 {
                return Ok(CommandOutput {
                    code: Some(self.exit_code),
                    stdout: String::new(),
                    stderr: "boom".to_string(),
                });
            }

            if args.iter().any(|a| a == "--show-npages") {
                return Ok(CommandOutput::exited(0, format!("{}\n", self.pages)));
            }

            let output = if program == GHOSTSCRIPT {
                args.iter()
                    .find_map(|a| a.strip_prefix("-sOutputFile="))
                    .map(str::to_string)
            } else {
                args.last().cloned()
            };
            if let Some(path) = output {
                std::fs::write(path, format!("%PDF-1.4 {}", args.len())).unwrap();
            }
            Ok(CommandOutput::exited(0, ""))
        }
    }

    fn processor(runner: &Arc<FakeRunner>) -> PdfProcessor {
        PdfProcessor::with_runner(runner.clone())
    }

    #[test]
    fn test_encrypt_256_permissions() {
        let runner = Arc::new(FakeRunner::default());
        let security = PdfSecurity {
            user_password: "user".into(),
            owner_password: "owner".into(),
            allow_printing: true,
            encryption_bits: 256,
            ..Default::default()
        };

        let out = processor(&runner).encrypt(b"%PDF-1.4", &security).unwrap();
        assert!(out.starts_with(b"%PDF-"));

        let (program, args) = &runner.calls()[0];
        assert_eq!(program, "qpdf");
        assert!(args[0].starts_with('@'));

        let encrypt = &runner.argfiles()[0];
        assert_eq!(
            &encrypt[..4],
            &["--encrypt", "--user-password=user", "--owner-password=owner", "--bits=256"]
        );
        assert!(encrypt.contains(&"--print=full".to_string()));
        assert!(encrypt.contains(&"--modify=none".to_string()));
        assert!(encrypt.contains(&"--extract=n".to_string()));
        assert_eq!(encrypt.last().map(String::as_str), Some("--"));
    }

    #[test]
    fn test_passwords_stay_off_command_line() {
        let runner = Arc::new(FakeRunner::default());
        let security = PdfSecurity {
            user_password: "hunter2-user".into(),
            owner_password: "s3cret-owner".into(),
            ..Default::default()
        };
        processor(&runner).encrypt(b"%PDF-1.4", &security).unwrap();

        let (_, args) = &runner.calls()[0];
        assert!(args.iter().all(|a| !a.contains("hunter2") && !a.contains("s3cret")));
        assert!(runner.argfiles()[0].iter().any(|a| a.contains("hunter2-user")));
    }

    #[test]
    fn test_password_line_break_rejected() {
        let runner = Arc::new(FakeRunner::default());
        let security = PdfSecurity {
            user_password: "a\n--decrypt".into(),
            ..Default::default()
        };
        let result = processor(&runner).encrypt(b"%PDF-1.4", &security);
        assert!(matches!(result, Err(ConversionError::InvalidRequest(_))));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_encrypt_128_only_lists_restrictions() {
        let security = PdfSecurity {
            owner_password: "owner".into(),
            allow_printing: true,
            allow_copying: true,
            encryption_bits: 128,
            ..Default::default()
        };
        let args = security.qpdf_args();
        assert_eq!(
            args,
            vec!["--user-password=", "--owner-password=owner", "--bits=128", "--modify=n"]
        );
    }

    #[test]
    fn test_encrypt_without_passwords_is_noop() {
        let runner = Arc::new(FakeRunner::default());
        let out = processor(&runner)
            .encrypt(b"%PDF-1.4 original", &PdfSecurity::default())
            .unwrap();

        assert_eq!(out, b"%PDF-1.4 original");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_unknown_key_length_defaults_to_256() {
        let security = PdfSecurity {
            user_password: "u".into(),
            encryption_bits: 40,
            ..Default::default()
        };
        assert_eq!(security.key_bits(), 256);
    }

    #[test]
    fn test_merge_requires_two_inputs() {
        let runner = Arc::new(FakeRunner::default());
        let result = processor(&runner).merge(&[b"%PDF".to_vec()]);
        assert!(matches!(result, Err(ConversionError::InvalidRequest(_))));
    }

    #[test]
    fn test_merge_passes_inputs_in_order() {
        let runner = Arc::new(FakeRunner::default());
        processor(&runner)
            .merge(&[b"%PDF a".to_vec(), b"%PDF b".to_vec(), b"%PDF c".to_vec()])
            .unwrap();

        let (_, args) = &runner.calls()[0];
        assert_eq!(&args[..2], &["--empty", "--pages"]);
        assert!(args[2].ends_with("input-0.pdf"));
        assert!(args[4].ends_with("input-2.pdf"));
        assert_eq!(args[5], "--");
    }

    #[test]
    fn test_page_count() {
        let runner = Arc::new(FakeRunner::with_pages(7));
        assert_eq!(processor(&runner).page_count(b"%PDF").unwrap(), 7);
    }

    #[test]
    fn test_split_every_n() {
        let runner = Arc::new(FakeRunner::with_pages(5));
        let parts = processor(&runner)
            .split(b"%PDF", &SplitMode::EveryN(2))
            .unwrap();

        assert_eq!(parts.len(), 3);
        let ranges: Vec<String> = runner
            .calls()
            .iter()
            .skip(1)
            .map(|(_, args)| args[3].clone())
            .collect();
        assert_eq!(ranges, vec!["1-2", "3-4", "5"]);
    }

    #[test]
    fn test_split_ranges_and_all() {
        let runner = Arc::new(FakeRunner::with_pages(3));
        let parts = processor(&runner)
            .split(b"%PDF", &SplitMode::Ranges("1-2, 3".into()))
            .unwrap();
        assert_eq!(parts.len(), 2);

        let parts = processor(&runner).split(b"%PDF", &SplitMode::All).unwrap();
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_rotate_argument() {
        let runner = Arc::new(FakeRunner::default());
        processor(&runner).rotate(b"%PDF", 90, Some("1-3")).unwrap();
        assert_eq!(runner.calls()[0].1[0], "--rotate=+90:1-3");

        assert!(processor(&runner).rotate(b"%PDF", 45, None).is_err());
    }

    #[test]
    fn test_reorder() {
        let runner = Arc::new(FakeRunner::default());
        processor(&runner).reorder(b"%PDF", &[3, 1, 2]).unwrap();
        assert_eq!(runner.calls()[0].1[3], "3,1,2");

        assert!(processor(&runner).reorder(b"%PDF", &[0, 1]).is_err());
    }

    #[test]
    fn test_compress_reports_savings() {
        let runner = Arc::new(FakeRunner::default());
        let big = vec![b'x'; 1000];
        let result = processor(&runner).compress(&big, CompressionLevel::Screen).unwrap();

        assert!(result.savings_percent > 90);
        let (program, args) = &runner.calls()[0];
        assert_eq!(program, "gs");
        assert!(args.contains(&"-dPDFSETTINGS=/screen".to_string()));
    }

    #[test]
    fn test_tool_failure_is_processing_error() {
        let runner = Arc::new(FakeRunner {
            exit_code: 2,
            ..Default::default()
        });
        let result = processor(&runner).extract(b"%PDF", "1");
        assert!(matches!(result, Err(ConversionError::Processing(msg)) if msg.contains("boom")));
    }

    #[test]
    fn test_validate_page_ranges() {
        assert!(validate_page_ranges("1-3,5,7-z").is_ok());
        assert!(validate_page_ranges("r1").is_ok());
        assert!(validate_page_ranges("").is_err());
        assert!(validate_page_ranges("0").is_err());
        assert!(validate_page_ranges("1-a").is_err());
        assert!(validate_page_ranges("1;rm -rf").is_err());
    }

    #[test]
    fn test_chunk_ranges() {
        assert_eq!(chunk_ranges(4, 1), vec!["1", "2", "3", "4"]);
        assert_eq!(chunk_ranges(5, 3), vec!["1-3", "4-5"]);
        assert!(chunk_ranges(0, 2).is_empty());
    }
}
