use super::model::{AstecaCluster, CrossMatch, LiteratureTable};

/// An ASteCA cluster paired with its row in the literature table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'a> {
    pub cluster: &'a AstecaCluster,
    pub row: usize,
}

/// Index of the first literature row whose name equals `name` exactly.
pub fn find_row(table: &LiteratureTable, name: &str) -> Option<usize> {
    table
        .records
        .iter()
        .position(|rec| rec.text(&table.name_column).as_deref() == Some(name))
}

/// Pair every ASteCA cluster with its literature row, keeping the ASteCA
/// order. Clusters absent from the table are reported and dropped.
pub fn match_clusters<'a>(clusters: &'a [AstecaCluster], table: &LiteratureTable) -> Vec<Match<'a>> {
    clusters
        .iter()
        .filter_map(|cluster| match find_row(table, &cluster.name) {
            Some(row) => Some(Match { cluster, row }),
            None => {
                log::warn!("{} not found in the literature table", cluster.name);
                None
            }
        })
        .collect()
}

pub fn find_crossmatch<'a>(rows: &'a [CrossMatch], name: &str) -> Option<&'a CrossMatch> {
    rows.iter().find(|r| r.name == name)
}
