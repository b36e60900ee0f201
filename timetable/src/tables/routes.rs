use crate::error::Result;
use crate::index::{LineIdx, RouteIdx};
use crate::table::{column_table, ColumnTable};

column_table! {
    /// Thin grouping of journey patterns under a line.
    pub struct Routes {
        name: "routes",
        index: RouteIdx,
        slack: 16,
        columns: {
            lines: LineIdx,
        }
    }
}

impl Routes {
    pub fn add(&mut self, lines: &[LineIdx]) -> Result<RouteIdx> {
        let start = self.begin_append(lines.len())?;
        for &line in lines {
            self.push_row(line)?;
        }
        Ok(start)
    }

    pub fn line(&self, route: RouteIdx) -> Option<LineIdx> {
        self.lines().get(route as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_index_limit() {
        let mut routes = Routes::new();
        let lines = vec![0; RouteIdx::MAX as usize];
        assert_eq!(routes.add(&lines).unwrap(), 0);
        assert_eq!(routes.len(), 65_535);
        assert!(routes.add(&[1]).is_err());
        assert!(routes.add(&[]).is_ok());
        assert_eq!(routes.line(65_534), Some(0));
    }
}
