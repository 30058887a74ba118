//! Text file output for completed scans. A scan written to a base path `P` produces:
//!
//! * `P.ply` and `P_error.ply`: ASCII point clouds of the ideal and noisy points
//! * `P_points.txt` and `P_error.txt`: one `x y z screenX screenY exposure` line per point
//! * `P_labels.txt` and `P_labelsDetailed.txt`: the coarse and fine label of each point
//! * `P_objects.txt`: one record line per object
//!
//! All positions are relative to the sensor origin. Missing projections are written as `-1`.

use crate::grid::Projection;
use crate::projector::ObjectRecord;
use crate::session::ScanOutput;
use crate::{Point2, Result, Vector3};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes an ASCII `.ply` file with float x/y/z vertices
pub fn write_ply<W: Write>(writer: &mut W, points: &[Vector3]) -> Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", points.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "end_header")?;
    for p in points {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

/// Writes one `x y z screenX screenY exposure` line per point
pub fn write_points_file<W: Write>(
    writer: &mut W,
    points: &[(Vector3, Option<Projection>)],
) -> Result<()> {
    for (p, proj) in points {
        let (sx, sy, ex) = match proj {
            Some(proj) => (proj.screen_x, proj.screen_y, proj.exposure as i64),
            None => (-1, -1, -1),
        };
        writeln!(writer, "{} {} {} {} {} {}", p.x, p.y, p.z, sx, sy, ex)?;
    }
    Ok(())
}

/// Writes one label per line
pub fn write_labels<W: Write, T: std::fmt::Display>(writer: &mut W, labels: &[T]) -> Result<()> {
    for label in labels {
        writeln!(writer, "{}", label)?;
    }
    Ok(())
}

fn xy_or_missing(p: &Option<Point2>) -> (f64, f64) {
    p.map(|p| (p.x, p.y)).unwrap_or((-1.0, -1.0))
}

/// Formats an object as a single space-separated record:
///
/// `id hash minX minY minZ pMinX pMinY maxX maxY maxZ pMaxX pMaxY posX posY posZ rotX rotY rotZ
/// pCenterX pCenterY dimX dimY dimZ class truncated`
pub fn record_line(record: &ObjectRecord) -> String {
    let (pmin_x, pmin_y) = xy_or_missing(&record.projected_min);
    let (pmax_x, pmax_y) = xy_or_missing(&record.projected_max);
    let (pc_x, pc_y) = xy_or_missing(&record.projected_center);
    let min = &record.min_corner;
    let max = &record.max_corner;
    let pos = &record.position;
    let rot = &record.rotation;
    let dim = &record.dimensions;

    let fields: Vec<String> = vec![
        record.id.to_string(),
        record.model.to_string(),
        min.x.to_string(),
        min.y.to_string(),
        min.z.to_string(),
        pmin_x.to_string(),
        pmin_y.to_string(),
        max.x.to_string(),
        max.y.to_string(),
        max.z.to_string(),
        pmax_x.to_string(),
        pmax_y.to_string(),
        pos.x.to_string(),
        pos.y.to_string(),
        pos.z.to_string(),
        rot.x.to_string(),
        rot.y.to_string(),
        rot.z.to_string(),
        pc_x.to_string(),
        pc_y.to_string(),
        dim.x.to_string(),
        dim.y.to_string(),
        dim.z.to_string(),
        record.class.label().to_string(),
        (record.truncated as u8).to_string(),
    ];
    fields.join(" ")
}

pub fn write_object_records<W: Write>(writer: &mut W, records: &[ObjectRecord]) -> Result<()> {
    for r in records {
        writeln!(writer, "{}", record_line(r))?;
    }
    Ok(())
}

/// Appends `suffix` to the file name of `base`, keeping its directory
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    base.with_file_name(name)
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Writes every output file of a completed scan next to `base`, returning the paths written
pub fn write_scan(output: &ScanOutput, base: &Path) -> Result<Vec<PathBuf>> {
    if let Some(parent) = base.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let ideal = output.ideal_points();
    let noisy = output.noisy_points();
    let ideal_proj: Vec<_> = output.points.iter().map(|p| (p.point, p.projection)).collect();
    let noisy_proj: Vec<_> = output
        .points
        .iter()
        .map(|p| (p.noisy, p.noisy_projection))
        .collect();

    let mut written = Vec::new();

    let path = with_suffix(base, ".ply");
    write_file(&path, |w| write_ply(w, &ideal))?;
    written.push(path);

    let path = with_suffix(base, "_error.ply");
    write_file(&path, |w| write_ply(w, &noisy))?;
    written.push(path);

    let path = with_suffix(base, "_points.txt");
    write_file(&path, |w| write_points_file(w, &ideal_proj))?;
    written.push(path);

    let path = with_suffix(base, "_error.txt");
    write_file(&path, |w| write_points_file(w, &noisy_proj))?;
    written.push(path);

    let path = with_suffix(base, "_labels.txt");
    write_file(&path, |w| write_labels(w, &output.coarse_labels()))?;
    written.push(path);

    let path = with_suffix(base, "_labelsDetailed.txt");
    write_file(&path, |w| write_labels(w, &output.fine_labels()))?;
    written.push(path);

    let path = with_suffix(base, "_objects.txt");
    write_file(&path, |w| write_object_records(w, &output.objects))?;
    written.push(path);

    log::info!(
        "Scan {}: wrote {} points and {} objects to {}",
        output.session,
        output.points.len(),
        output.objects.len(),
        base.display()
    );

    Ok(written)
}
