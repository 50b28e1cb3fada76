use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;
use anyhow::{anyhow, bail, Context};

pub const MAX_FILTER_SOURCES: usize = 32;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FilterMode {
    Include,
    Exclude,
}

/// IGMPv3 style source filter for a single group join: either receive *only* from the listed
///  sources, or from everybody *except* them.
///
/// The textual form is `+addr1,addr2,...` for INCLUDE and `-addr1,...` for EXCLUDE. An empty
///  list after the mode character parses successfully - whether that is usable depends on the
///  mode and is decided when the join is planned.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SourceFilter {
    pub mode: FilterMode,
    pub sources: Vec<Ipv4Addr>,
}

impl SourceFilter {
    pub fn include(sources: Vec<Ipv4Addr>) -> SourceFilter {
        SourceFilter { mode: FilterMode::Include, sources }
    }

    pub fn exclude(sources: Vec<Ipv4Addr>) -> SourceFilter {
        SourceFilter { mode: FilterMode::Exclude, sources }
    }

    /// Blank input means 'no filter'
    pub fn parse(s: &str) -> anyhow::Result<Option<SourceFilter>> {
        let s = s.trim_start();
        if s.is_empty() {
            return Ok(None);
        }

        let mode = match s.as_bytes()[0] {
            b'+' => FilterMode::Include,
            b'-' => FilterMode::Exclude,
            _ => bail!("source filter must start with '+' (include) or '-' (exclude): {:?}", s),
        };

        let list = s[1..].trim();
        let mut sources = Vec::new();
        if !list.is_empty() {
            for raw in list.split(',') {
                let addr = Ipv4Addr::from_str(raw.trim())
                    .with_context(|| format!("invalid source address {:?} in source filter", raw))?;
                sources.push(addr);
            }
        }

        if sources.len() > MAX_FILTER_SOURCES {
            bail!("source filter has {} addresses, at most {} are supported", sources.len(), MAX_FILTER_SOURCES);
        }

        Ok(Some(SourceFilter { mode, sources }))
    }
}

impl FromStr for SourceFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceFilter::parse(s)?
            .ok_or_else(|| anyhow!("empty source filter"))
    }
}

impl Display for SourceFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            FilterMode::Include => '+',
            FilterMode::Exclude => '-',
        };
        let sources = self.sources.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}{}", mode, sources)
    }
}
