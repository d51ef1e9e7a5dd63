//! Printable implementations for ShaperInfo and ScopeCapabilities.

use std::io::Write;

use serde_json::json;

use crate::output::formatting::{format_bytes, format_rate};
use crate::output::{OutputOptions, Printable};
use crate::shaper::{Handle, ScopeCapabilities, ShaperInfo};

fn handle_json(handle: Handle) -> serde_json::Value {
    json!({
        "scope": handle.scope().name(),
        "id": handle.id(),
    })
}

impl Printable for ShaperInfo {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        write!(w, "{}", self.handle)?;
        if self.parent != Handle::NONE {
            write!(w, " parent {}", self.parent)?;
        }
        write!(w, " metric {}", self.metric.name())?;

        let rate = |v: u64| {
            if opts.numeric {
                v.to_string()
            } else {
                format_rate(self.metric, v)
            }
        };
        if self.bw_min != 0 || opts.details {
            write!(w, " bw-min {}", rate(self.bw_min))?;
        }
        if self.bw_max != 0 || opts.details {
            write!(w, " bw-max {}", rate(self.bw_max))?;
        }
        if self.burst != 0 || opts.details {
            if opts.numeric {
                write!(w, " burst {}", self.burst)?;
            } else {
                write!(w, " burst {}", format_bytes(self.burst))?;
            }
        }
        if self.priority != 0 || opts.details {
            write!(w, " priority {}", self.priority)?;
        }
        if self.weight != 0 || opts.details {
            write!(w, " weight {}", self.weight)?;
        }
        if self.children != 0 {
            write!(w, " children {}", self.children)?;
        }

        writeln!(w)
    }

    fn to_json(&self) -> serde_json::Value {
        let mut obj = json!({
            "handle": handle_json(self.handle),
            "metric": self.metric.name(),
            "bw-min": self.bw_min,
            "bw-max": self.bw_max,
            "burst": self.burst,
            "priority": self.priority,
            "weight": self.weight,
        });

        if self.parent != Handle::NONE {
            obj["parent"] = handle_json(self.parent);
        }
        if self.children != 0 {
            obj["children"] = json!(self.children);
        }

        obj
    }
}

impl Printable for ScopeCapabilities {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> std::io::Result<()> {
        write!(w, "ifindex {} scope {}:", self.ifindex, self.scope)?;
        for cap in self.caps.iter() {
            write!(w, " {}", cap.name())?;
        }
        writeln!(w)
    }

    fn to_json(&self) -> serde_json::Value {
        let support: Vec<_> = self.caps.iter().map(|c| c.name()).collect();
        json!({
            "ifindex": self.ifindex,
            "scope": self.scope.name(),
            "support": support,
        })
    }
}
