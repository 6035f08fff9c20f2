//! Console table rendering of a ranked contributor report.

use crate::Result;
use crate::engine::{ContributorAggregate, RankReport};
use core::fmt::Write;
use owo_colors::OwoColorize;

const COLUMN_GAP: usize = 2;
const UNKNOWN_LOCATION: &str = "unknown";

/// Render the ranked report as an aligned console table.
pub fn generate<W: Write>(report: &RankReport, use_colors: bool, writer: &mut W) -> Result<()> {
    ConsoleReporter::new(writer, use_colors).generate_report(report)
}

struct ConsoleReporter<'a, W: Write> {
    writer: &'a mut W,
    use_colors: bool,
}

impl<'a, W: Write> ConsoleReporter<'a, W> {
    const fn new(writer: &'a mut W, use_colors: bool) -> Self {
        Self { writer, use_colors }
    }

    fn generate_report(&mut self, report: &RankReport) -> Result<()> {
        if report.contributors.is_empty() {
            writeln!(self.writer, "No contributors found across {} repositories.", report.repos_searched)?;
            return Ok(());
        }

        let layout = Layout::new(&report.contributors);
        self.write_header(&layout)?;
        for aggregate in &report.contributors {
            self.write_row(&layout, aggregate)?;
        }

        writeln!(self.writer)?;
        writeln!(
            self.writer,
            "{} contributors across {} repositories",
            report.contributors.len(),
            report.repos_searched
        )?;
        Ok(())
    }

    fn write_header(&mut self, layout: &Layout) -> Result<()> {
        let header = format!(
            "{:<login$}{gap}{:>contrib$}{gap}{:>followers$}{gap}{:>repos$}{gap}{:<location$}{gap}URL",
            "CONTRIBUTOR",
            "CONTRIBUTIONS",
            "FOLLOWERS",
            "PUBLIC REPOS",
            "LOCATION",
            login = layout.login,
            contrib = layout.contributions,
            followers = layout.followers,
            repos = layout.public_repos,
            location = layout.location,
            gap = " ".repeat(COLUMN_GAP),
        );

        if self.use_colors {
            writeln!(self.writer, "{}", header.bold())?;
        } else {
            writeln!(self.writer, "{header}")?;
        }
        Ok(())
    }

    fn write_row(&mut self, layout: &Layout, aggregate: &ContributorAggregate) -> Result<()> {
        writeln!(
            self.writer,
            "{:<login$}{gap}{:>contrib$}{gap}{:>followers$}{gap}{:>repos$}{gap}{:<location$}{gap}{}",
            aggregate.login,
            aggregate.total_contributions,
            aggregate.followers,
            aggregate.public_repos,
            aggregate.location.as_deref().unwrap_or(UNKNOWN_LOCATION),
            aggregate.profile_url,
            login = layout.login,
            contrib = layout.contributions,
            followers = layout.followers,
            repos = layout.public_repos,
            location = layout.location,
            gap = " ".repeat(COLUMN_GAP),
        )?;
        Ok(())
    }
}

/// Column widths sized to the widest cell (header included).
struct Layout {
    login: usize,
    contributions: usize,
    followers: usize,
    public_repos: usize,
    location: usize,
}

impl Layout {
    fn new(contributors: &[ContributorAggregate]) -> Self {
        let mut layout = Self {
            login: "CONTRIBUTOR".len(),
            contributions: "CONTRIBUTIONS".len(),
            followers: "FOLLOWERS".len(),
            public_repos: "PUBLIC REPOS".len(),
            location: "LOCATION".len(),
        };

        for c in contributors {
            layout.login = layout.login.max(c.login.len());
            layout.contributions = layout.contributions.max(digits(c.total_contributions));
            layout.followers = layout.followers.max(digits(c.followers));
            layout.public_repos = layout.public_repos.max(digits(c.public_repos));
            let location = c.location.as_deref().unwrap_or(UNKNOWN_LOCATION);
            layout.location = layout.location.max(location.len());
        }

        layout
    }
}

fn digits(value: u64) -> usize {
    value.to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(login: &str, total: u64, followers: u64, location: Option<&str>) -> ContributorAggregate {
        ContributorAggregate {
            login: login.to_string(),
            total_contributions: total,
            followers,
            public_repos: 3,
            location: location.map(str::to_string),
            profile_url: format!("https://github.com/{login}"),
        }
    }

    fn report(contributors: Vec<ContributorAggregate>) -> RankReport {
        RankReport {
            repos_searched: 2,
            contributors,
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn renders_rows_in_report_order() {
        let report = report(vec![
            aggregate("alice", 13, 100, Some("Lisbon")),
            aggregate("carol", 7, 50, None),
            aggregate("bob", 5, 20, Some("Oslo")),
        ]);

        let mut out = String::new();
        generate(&report, false, &mut out).unwrap();

        let alice = out.find("alice").unwrap();
        let carol = out.find("carol").unwrap();
        let bob = out.find("bob").unwrap();
        assert!(alice < carol && carol < bob);
    }

    #[test]
    fn unknown_location_marker() {
        let report = report(vec![aggregate("carol", 7, 50, None)]);

        let mut out = String::new();
        generate(&report, false, &mut out).unwrap();
        assert!(out.contains(UNKNOWN_LOCATION));
    }

    #[test]
    fn empty_report_renders_notice_not_table() {
        let report = report(Vec::new());

        let mut out = String::new();
        generate(&report, false, &mut out).unwrap();
        assert!(out.contains("No contributors found"));
        assert!(!out.contains("CONTRIBUTOR "));
    }

    #[test]
    fn includes_profile_fields() {
        let report = report(vec![aggregate("alice", 13, 100, Some("Lisbon"))]);

        let mut out = String::new();
        generate(&report, false, &mut out).unwrap();
        assert!(out.contains("13"));
        assert!(out.contains("100"));
        assert!(out.contains("Lisbon"));
        assert!(out.contains("https://github.com/alice"));
    }
}
