//! Unpacking a workbook into a scratch directory and packing it back up

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::{PatchError, PatchResult};

/// One member of the original archive
#[derive(Debug, Clone)]
struct ArchiveEntry {
    name: String,
    compression: CompressionMethod,
    is_dir: bool,
}

/// A workbook archive extracted into its own scratch directory.
///
/// The directory is deleted when this value is dropped, whether or not the
/// patch succeeded.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    entries: Vec<ArchiveEntry>,
}

impl ExtractedArchive {
    /// Extract the archive at `path` into a fresh scratch directory
    pub fn extract<P: AsRef<Path>>(path: P) -> PatchResult<Self> {
        let file = File::open(path)?;
        Self::extract_from(BufReader::new(file))
    }

    /// Extract an archive from a reader into a fresh scratch directory
    pub fn extract_from<R: Read + Seek>(reader: R) -> PatchResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let dir = tempfile::Builder::new().prefix("cellpatch-").tempdir()?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut member = archive.by_index(i)?;
            let name = member.name().to_string();
            let relative = member
                .enclosed_name()
                .ok_or_else(|| PatchError::InvalidFormat(format!("unsafe member path: {}", name)))?;
            let target = dir.path().join(relative);

            if member.is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                copy_member(&mut member, File::create(&target)?)?;
            }

            entries.push(ArchiveEntry {
                name,
                compression: member.compression(),
                is_dir: member.is_dir(),
            });
        }

        log::debug!(
            "extracted {} archive members into {}",
            entries.len(),
            dir.path().display()
        );

        Ok(Self { dir, entries })
    }

    /// Root of the scratch directory
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Filesystem path of an archive member (e.g. `xl/workbook.xml`)
    pub fn part_path(&self, part: &str) -> PathBuf {
        part.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.dir.path().to_path_buf(), |path, segment| path.join(segment))
    }

    /// Whether the archive contained the given member
    pub fn contains(&self, part: &str) -> bool {
        self.entries.iter().any(|e| !e.is_dir && e.name == part)
    }

    /// Read an extracted member into memory
    pub fn read_part(&self, part: &str) -> PatchResult<Vec<u8>> {
        if !self.contains(part) {
            return Err(PatchError::MissingPart(part.to_string()));
        }
        Ok(fs::read(self.part_path(part))?)
    }

    /// Replace the contents of an extracted member
    pub fn write_part(&self, part: &str, contents: &[u8]) -> PatchResult<()> {
        if !self.contains(part) {
            return Err(PatchError::MissingPart(part.to_string()));
        }
        fs::write(self.part_path(part), contents)?;
        Ok(())
    }

    /// Compress the scratch directory into a new archive at `output`.
    ///
    /// Members are written in their original order and keep their compression
    /// method. The archive is assembled in a temporary file next to `output`
    /// and renamed into place only once it is complete; an existing file at
    /// `output` is replaced.
    pub fn repack<P: AsRef<Path>>(&self, output: P) -> PatchResult<()> {
        let output = output.as_ref();
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".cellpatch-")
            .suffix(".xlsx.tmp")
            .tempfile_in(parent)?;
        self.write_archive(&mut tmp)?;

        tmp.as_file().sync_all()?;
        tmp.persist(output).map_err(|e| PatchError::Io(e.error))?;

        log::debug!("wrote {}", output.display());
        Ok(())
    }

    fn write_archive(&self, tmp: &mut NamedTempFile) -> PatchResult<()> {
        let mut zip = zip::ZipWriter::new(BufWriter::new(tmp.as_file_mut()));

        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            });

            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
                continue;
            }

            zip.start_file(entry.name.as_str(), options)?;
            let mut member = File::open(self.part_path(&entry.name))?;
            io::copy(&mut member, &mut zip)?;
        }

        let mut writer = zip.finish()?;
        writer.flush()?;
        Ok(())
    }
}

/// Copy one member out of the archive, surfacing errors from the final flush
fn copy_member<R: Read, W: Write>(member: &mut R, file: W) -> io::Result<()> {
    let mut out = BufWriter::new(file);
    io::copy(member, &mut out)?;
    out.into_inner().map_err(|e| e.into_error())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    /// Accepts nothing, like a full disk
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sample_archive() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let deflated = SimpleFileOptions::default();
            let stored =
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

            zip.start_file("[Content_Types].xml", deflated).unwrap();
            zip.write_all(b"<Types/>").unwrap();
            zip.add_directory("xl/", deflated).unwrap();
            zip.start_file("xl/workbook.xml", deflated).unwrap();
            zip.write_all(b"<workbook/>").unwrap();
            zip.start_file("xl/media/image1.png", stored).unwrap();
            zip.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_extract_and_read_parts() {
        let extracted = ExtractedArchive::extract_from(Cursor::new(sample_archive())).unwrap();

        assert!(extracted.contains("xl/workbook.xml"));
        assert!(!extracted.contains("xl/"));
        assert!(!extracted.contains("xl/sharedStrings.xml"));
        assert_eq!(extracted.read_part("xl/workbook.xml").unwrap(), b"<workbook/>");
        assert!(matches!(
            extracted.read_part("xl/sharedStrings.xml"),
            Err(PatchError::MissingPart(_))
        ));
    }

    #[test]
    fn test_repack_preserves_order_and_compression() {
        let extracted = ExtractedArchive::extract_from(Cursor::new(sample_archive())).unwrap();
        extracted.write_part("xl/workbook.xml", b"<workbook><sheets/></workbook>").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("out.xlsx");
        extracted.repack(&output).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        let mut in_order = Vec::new();
        for i in 0..archive.len() {
            in_order.push(archive.by_index(i).unwrap().name().to_string());
        }
        assert_eq!(names.len(), 4);
        assert_eq!(
            in_order,
            vec!["[Content_Types].xml", "xl/", "xl/workbook.xml", "xl/media/image1.png"]
        );

        let image = archive.by_name("xl/media/image1.png").unwrap();
        assert_eq!(image.compression(), CompressionMethod::Stored);
        drop(image);

        let mut workbook = String::new();
        archive
            .by_name("xl/workbook.xml")
            .unwrap()
            .read_to_string(&mut workbook)
            .unwrap();
        assert_eq!(workbook, "<workbook><sheets/></workbook>");

        // Only the output is left behind
        let leftovers: Vec<_> = fs::read_dir(out_dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_scratch_directory_removed_on_drop() {
        let extracted = ExtractedArchive::extract_from(Cursor::new(sample_archive())).unwrap();
        let root = extracted.root().to_path_buf();
        assert!(root.join("xl").join("workbook.xml").exists());

        drop(extracted);
        assert!(!root.exists());
    }

    #[test]
    fn test_copy_member_reports_failed_flush() {
        // Small enough to sit in the buffer until the final flush
        let result = copy_member(&mut &b"<workbook/>"[..], FullDisk);
        assert!(result.is_err());

        let mut written = Vec::new();
        copy_member(&mut &b"<workbook/>"[..], &mut written).unwrap();
        assert_eq!(written, b"<workbook/>");
    }

    #[test]
    fn test_extract_rejects_non_zip() {
        let result = ExtractedArchive::extract_from(Cursor::new(b"not a zip".to_vec()));
        assert!(matches!(result, Err(PatchError::Zip(_))));
    }
}
