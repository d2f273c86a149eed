/// Printable strip export
///
/// Each page of the template holds two columns of paper strip. The first
/// column of page one is shorter because the strip header sits above it.
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::assets::{AssetStore, PAGE_TEMPLATE};
use super::{Composition, FileError};

pub const COLUMN_BEATS: usize = 72;
pub const START_COLUMN_BEATS: usize = 63;
pub const COLUMNS_PER_PAGE: usize = 2;

/// Distance between adjacent notes and adjacent beats on the page
pub const NOTE_SPACING: f64 = 7.564;

pub const Y_START: f64 = 75.956;
pub const Y_TOP: f64 = 15.444;
pub const X_COLUMN_1: f64 = 61.206;
pub const X_COLUMN_2: f64 = 216.223;

const CLOSING_TAG: &str = "</svg>";

pub fn column_index(beat: usize) -> usize {
    if beat < START_COLUMN_BEATS {
        0
    } else {
        1 + (beat - START_COLUMN_BEATS) / COLUMN_BEATS
    }
}

pub fn index_in_column(beat: usize) -> usize {
    if beat < START_COLUMN_BEATS {
        beat
    } else {
        (beat - START_COLUMN_BEATS) % COLUMN_BEATS
    }
}

pub fn page_index(beat: usize) -> usize {
    column_index(beat) / COLUMNS_PER_PAGE
}

pub fn x_pos(note: u8, beat: usize) -> f64 {
    let column_x = if column_index(beat) % 2 == 0 {
        X_COLUMN_1
    } else {
        X_COLUMN_2
    };
    column_x + f64::from(note) * NOTE_SPACING
}

pub fn y_pos(beat: usize) -> f64 {
    let top = if column_index(beat) == 0 { Y_START } else { Y_TOP };
    top + index_in_column(beat) as f64 * NOTE_SPACING
}

/// One punched hole
pub fn marker(note: u8, beat: usize) -> String {
    format!(
        "<circle cx=\"{:.3}\" cy=\"{:.3}\" r=\"2.5\" fill=\"#000000\"/>\n",
        x_pos(note, beat),
        y_pos(beat)
    )
}

/// Markers for every note, grouped by page. Pages between the first and the
/// last used page are present even when empty.
pub fn page_markers(composition: &Composition) -> BTreeMap<usize, String> {
    let mut pages: BTreeMap<usize, String> = BTreeMap::new();
    let last_page = match composition.beats().last() {
        Some((beat, _)) => page_index(beat),
        None => return pages,
    };
    for page in 0..=last_page {
        pages.insert(page, String::new());
    }
    for (beat, notes) in composition.beats() {
        let markers = pages.entry(page_index(beat)).or_default();
        for &note in notes {
            markers.push_str(&marker(note, beat));
        }
    }
    pages
}

/// Insert `markers` just before the template's closing tag
pub fn insert_markers(template: &str, markers: &str) -> Option<String> {
    let offset = template.rfind(CLOSING_TAG)?;
    let mut page = String::with_capacity(template.len() + markers.len());
    page.push_str(&template[..offset]);
    page.push_str(markers);
    page.push_str(&template[offset..]);
    Some(page)
}

/// `<base without extension><number>.svg`, numbering pages from one
pub fn page_path(base: &Path, page: usize) -> PathBuf {
    let mut name: OsString = base.with_extension("").into_os_string();
    name.push((page + 1).to_string());
    name.push(".svg");
    PathBuf::from(name)
}

/// Render and write every page. Pages whose template cannot be loaded are
/// skipped; the paths that were written are returned.
pub fn export_to_svg(
    base: &Path,
    composition: &Composition,
    assets: &dyn AssetStore,
) -> Result<Vec<PathBuf>, FileError> {
    let mut written = Vec::new();
    for (page, markers) in page_markers(composition) {
        let Some(rendered) = assets
            .load_text(PAGE_TEMPLATE)
            .and_then(|template| insert_markers(&template, &markers))
        else {
            log::debug!("{} for page {}, skipping it", FileError::AssetMissing, page + 1);
            continue;
        };
        let path = page_path(base, page);
        fs::write(&path, rendered).map_err(|source| FileError::Write {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    log::info!("Exported {} page(s) from {:?}", written.len(), base);
    Ok(written)
}
