/// Output file names for one zone.
///
/// A batch with exactly one valid zone writes unsuffixed names (`tile.png`);
/// otherwise every name carries the zone's 1-based input position (`tile_2.png`).
/// Downstream tooling relies on this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactNames {
    suffix: Option<usize>,
}

impl ArtifactNames {
    pub fn for_zone(index: usize, valid_zones: usize) -> Self {
        Self { suffix: (valid_zones != 1).then_some(index) }
    }

    #[inline] pub fn suffix(&self) -> Option<usize> { self.suffix }

    pub fn file(&self, stem: &str, extension: &str) -> String {
        match self.suffix {
            Some(n) => format!("{stem}_{n}.{extension}"),
            None => format!("{stem}.{extension}"),
        }
    }

    #[inline] pub fn tile(&self) -> String { self.file("tile", "png") }

    #[inline] pub fn polygon(&self) -> String { self.file("polygon", "json") }

    #[inline] pub fn predictions(&self) -> String { self.file("predictions", "csv") }

    #[inline] pub fn annotated(&self) -> String { self.file("annotated", "png") }
}
