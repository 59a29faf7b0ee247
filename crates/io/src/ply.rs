use fpcfilter_core::{FilterError, PointCloud, Result, Vertex};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write as _};
use std::path::Path;
use tracing::{debug, info};

/// Upper bound on vertices reserved up front, whatever the header claims.
const MAX_PREALLOC: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
}

/// A vertex property this codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    X,
    Y,
    Z,
    Nx,
    Ny,
    Nz,
    Red,
    Green,
    Blue,
    Views,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "x" => Field::X,
            "y" => Field::Y,
            "z" => Field::Z,
            "nx" => Field::Nx,
            "ny" => Field::Ny,
            "nz" => Field::Nz,
            "red" => Field::Red,
            "green" => Field::Green,
            "blue" => Field::Blue,
            "views" => Field::Views,
            _ => return None,
        })
    }

    fn is_float(self) -> bool {
        matches!(
            self,
            Field::X | Field::Y | Field::Z | Field::Nx | Field::Ny | Field::Nz
        )
    }

    fn byte_size(self) -> usize {
        if self.is_float() {
            4
        } else {
            1
        }
    }

    fn is_normal(self) -> bool {
        matches!(self, Field::Nx | Field::Ny | Field::Nz)
    }
}

/// Parsed header information.
#[derive(Debug)]
struct PlyHeader {
    format: PlyFormat,
    vertex_count: usize,
    fields: Vec<Field>,
}

impl PlyHeader {
    fn has_normals(&self) -> bool {
        self.fields.iter().any(|f| f.is_normal())
    }

    fn stride(&self) -> usize {
        self.fields.iter().map(|f| f.byte_size()).sum()
    }
}

fn parse_header<R: BufRead>(reader: &mut R, path: &Path) -> Result<PlyHeader> {
    let mut format = None;
    let mut vertex_count = None;
    let mut fields: Vec<Field> = Vec::new();
    let mut line = String::new();
    let mut first = true;

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData => FilterError::format(path, "header is not valid UTF-8"),
                _ => FilterError::read(path, e),
            })?;
        if read == 0 {
            return Err(FilterError::format(path, "missing end_header"));
        }

        let text = line.trim_end_matches(['\n', '\r']).trim();
        let parts: Vec<&str> = text.split_whitespace().collect();

        if first {
            if text != "ply" {
                return Err(FilterError::format(path, "file does not start with 'ply'"));
            }
            first = false;
            continue;
        }

        match parts.as_slice() {
            [] => {}
            ["comment", ..] | ["obj_info", ..] => {}
            ["format", kind, _version] => {
                format = Some(match *kind {
                    "ascii" => PlyFormat::Ascii,
                    "binary_little_endian" => PlyFormat::BinaryLittleEndian,
                    other => {
                        return Err(FilterError::format(
                            path,
                            format!("unsupported encoding '{other}'"),
                        ))
                    }
                });
            }
            ["element", "vertex", count] => {
                if vertex_count.is_some() {
                    return Err(FilterError::format(path, "duplicate vertex element"));
                }
                let count = count.parse::<usize>().map_err(|e| {
                    FilterError::format(path, format!("invalid vertex count '{count}': {e}"))
                })?;
                vertex_count = Some(count);
            }
            ["element", name, ..] => {
                return Err(FilterError::format(
                    path,
                    format!("unexpected element '{name}'"),
                ));
            }
            ["property", "list", ..] => {
                return Err(FilterError::format(path, "list properties are not supported"));
            }
            ["property", ty, name] => {
                if vertex_count.is_none() {
                    return Err(FilterError::format(
                        path,
                        format!("property '{name}' declared outside the vertex element"),
                    ));
                }
                let field = Field::from_name(name).ok_or_else(|| {
                    FilterError::format(path, format!("unexpected property '{name}'"))
                })?;
                let type_ok = match *ty {
                    "float" | "float32" => field.is_float(),
                    "uchar" | "uint8" => !field.is_float(),
                    _ => false,
                };
                if !type_ok {
                    return Err(FilterError::format(
                        path,
                        format!("property '{name}' has unsupported type '{ty}'"),
                    ));
                }
                if fields.contains(&field) {
                    return Err(FilterError::format(
                        path,
                        format!("property '{name}' declared twice"),
                    ));
                }
                fields.push(field);
            }
            ["end_header"] => break,
            _ => {
                return Err(FilterError::format(
                    path,
                    format!("unrecognised header line '{text}'"),
                ));
            }
        }
    }

    let format = format.ok_or_else(|| FilterError::format(path, "format line missing"))?;
    let vertex_count =
        vertex_count.ok_or_else(|| FilterError::format(path, "vertex element missing"))?;

    // With duplicates ruled out, the count decides which schema this is.
    let normals = fields.iter().filter(|f| f.is_normal()).count();
    if !((fields.len() == 7 && normals == 0) || (fields.len() == 10 && normals == 3)) {
        return Err(FilterError::format(
            path,
            format!(
                "expected x y z [nx ny nz] red green blue views, found {} properties",
                fields.len()
            ),
        ));
    }

    Ok(PlyHeader {
        format,
        vertex_count,
        fields,
    })
}

/// One vertex being assembled field by field.
#[derive(Default)]
struct Record {
    position: [f32; 3],
    normal: [f32; 3],
    color: [u8; 3],
    views: u8,
}

impl Record {
    fn set_float(&mut self, field: Field, value: f32) {
        match field {
            Field::X => self.position[0] = value,
            Field::Y => self.position[1] = value,
            Field::Z => self.position[2] = value,
            Field::Nx => self.normal[0] = value,
            Field::Ny => self.normal[1] = value,
            Field::Nz => self.normal[2] = value,
            _ => {}
        }
    }

    fn set_byte(&mut self, field: Field, value: u8) {
        match field {
            Field::Red => self.color[0] = value,
            Field::Green => self.color[1] = value,
            Field::Blue => self.color[2] = value,
            Field::Views => self.views = value,
            _ => {}
        }
    }

    fn into_vertex(self, has_normals: bool) -> Vertex {
        Vertex {
            position: self.position,
            normal: has_normals.then_some(self.normal),
            color: self.color,
            views: self.views,
        }
    }
}

fn read_binary_record<R: Read>(
    reader: &mut R,
    header: &PlyHeader,
    buf: &mut [u8],
    path: &Path,
) -> Result<Record> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => FilterError::format(path, "truncated vertex data"),
        _ => FilterError::read(path, e),
    })?;

    let mut record = Record::default();
    let mut off = 0;
    for &field in &header.fields {
        if field.is_float() {
            let bytes = [buf[off], buf[off + 1], buf[off + 2], buf[off + 3]];
            record.set_float(field, f32::from_le_bytes(bytes));
        } else {
            record.set_byte(field, buf[off]);
        }
        off += field.byte_size();
    }
    Ok(record)
}

fn read_ascii_record<R: BufRead>(
    reader: &mut R,
    header: &PlyHeader,
    line: &mut String,
    path: &Path,
) -> Result<Record> {
    line.clear();
    let read = reader
        .read_line(line)
        .map_err(|e| FilterError::read(path, e))?;
    if read == 0 {
        return Err(FilterError::format(path, "truncated vertex data"));
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != header.fields.len() {
        return Err(FilterError::format(
            path,
            format!(
                "vertex line has {} values, expected {}",
                tokens.len(),
                header.fields.len()
            ),
        ));
    }

    let mut record = Record::default();
    for (&field, token) in header.fields.iter().zip(tokens) {
        if field.is_float() {
            let value = token.parse::<f32>().map_err(|e| {
                FilterError::format(path, format!("invalid float '{token}': {e}"))
            })?;
            record.set_float(field, value);
        } else {
            let value = token.parse::<u8>().map_err(|e| {
                FilterError::format(path, format!("invalid byte '{token}': {e}"))
            })?;
            record.set_byte(field, value);
        }
    }
    Ok(record)
}

/// Read a PLY file into a [`PointCloud`].
pub fn read_ply(path: impl AsRef<Path>) -> Result<PointCloud> {
    read_ply_with(path, |_| true)
}

/// Read a PLY file, keeping only the points for which `keep` returns true.
///
/// The predicate sees each point's position before any of its other fields
/// are stored, so rejected points never occupy memory. Accepts
/// `binary_little_endian` and `ascii` files whose vertex element has exactly
/// the properties x, y, z, red, green, blue, views, optionally plus nx, ny,
/// nz, in any order.
pub fn read_ply_with<F>(path: impl AsRef<Path>, mut keep: F) -> Result<PointCloud>
where
    F: FnMut([f32; 3]) -> bool,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FilterError::read(path, e))?;
    let mut reader = BufReader::new(file);

    let header = parse_header(&mut reader, path)?;
    let has_normals = header.has_normals();
    debug!(
        path = %path.display(),
        format = ?header.format,
        vertices = header.vertex_count,
        has_normals,
        "parsed PLY header"
    );

    let mut cloud =
        PointCloud::with_capacity(header.vertex_count.min(MAX_PREALLOC), has_normals);

    match header.format {
        PlyFormat::BinaryLittleEndian => {
            let mut buf = vec![0u8; header.stride()];
            for _ in 0..header.vertex_count {
                let record = read_binary_record(&mut reader, &header, &mut buf, path)?;
                if keep(record.position) {
                    cloud.push(record.into_vertex(has_normals));
                }
            }
        }
        PlyFormat::Ascii => {
            let mut line = String::new();
            for _ in 0..header.vertex_count {
                let record = read_ascii_record(&mut reader, &header, &mut line, path)?;
                if keep(record.position) {
                    cloud.push(record.into_vertex(has_normals));
                }
            }
        }
    }

    info!(
        path = %path.display(),
        read = header.vertex_count,
        kept = cloud.len(),
        "loaded point cloud"
    );
    Ok(cloud)
}

/// Write `cloud` as a `binary_little_endian` PLY file.
///
/// Properties are written in the order x, y, z, [nx, ny, nz,] red, green,
/// blue, views. The data goes to a temporary file next to `path` that is
/// renamed over it once complete, so a failed write leaves no partial file.
pub fn write_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let tmp = tempfile::Builder::new()
        .prefix(".fpcfilter-")
        .suffix(".ply.tmp")
        .tempfile_in(dir)
        .map_err(|e| FilterError::write(path, e))?;
    debug!(tmp = %tmp.path().display(), "staging point cloud");

    let mut w = BufWriter::new(tmp);
    write_body(&mut w, cloud)
        .and_then(|()| w.flush())
        .map_err(|e| FilterError::write(path, e))?;
    let tmp = w
        .into_inner()
        .map_err(|e| FilterError::write(path, e.into_error()))?;

    // Temporary files are created owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(|e| FilterError::write(path, e))?;
    }

    tmp.persist(path).map_err(|e| FilterError::write(path, e.error))?;

    info!(path = %path.display(), points = cloud.len(), "wrote point cloud");
    Ok(())
}

fn write_body<W: io::Write>(w: &mut W, cloud: &PointCloud) -> io::Result<()> {
    w.write_all(b"ply\n")?;
    w.write_all(b"format binary_little_endian 1.0\n")?;
    writeln!(w, "comment Generated by fpcfilter {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(w, "element vertex {}", cloud.len())?;
    w.write_all(b"property float x\n")?;
    w.write_all(b"property float y\n")?;
    w.write_all(b"property float z\n")?;

    if cloud.has_normals() {
        w.write_all(b"property float nx\n")?;
        w.write_all(b"property float ny\n")?;
        w.write_all(b"property float nz\n")?;
    }

    w.write_all(b"property uchar red\n")?;
    w.write_all(b"property uchar green\n")?;
    w.write_all(b"property uchar blue\n")?;
    w.write_all(b"property uchar views\n")?;
    w.write_all(b"end_header\n")?;

    for i in 0..cloud.len() {
        w.write_all(&cloud.x[i].to_le_bytes())?;
        w.write_all(&cloud.y[i].to_le_bytes())?;
        w.write_all(&cloud.z[i].to_le_bytes())?;

        if let Some(normals) = &cloud.normals {
            w.write_all(&normals.nx[i].to_le_bytes())?;
            w.write_all(&normals.ny[i].to_le_bytes())?;
            w.write_all(&normals.nz[i].to_le_bytes())?;
        }

        w.write_all(&[
            cloud.colors.r[i],
            cloud.colors.g[i],
            cloud.colors.b[i],
            cloud.views[i],
        ])?;
    }

    Ok(())
}
