//! Node filter expression parsing and matching
//!
//! Selects a subset of discovered nodes with a small expression language
//! over node attributes. Filter values never fail to parse: malformed pieces
//! are rescued as literal matches or dropped with a warning.
//!
//! # Syntax
//!
//! ```text
//! attr: value              Attribute equals value (case-insensitive)
//! !attr: value             Attribute does not equal value
//! attr: v1,v2              Attribute equals any of the values
//! attr: pattern            Regex search when the value contains * ? [ ] ( ) ^ $
//! tags: a+b,c              Node has (a AND b) OR c
//! word                     Shorthand for `nodename: word`
//! multiple clauses         Clauses separated by whitespace combine with AND
//! ```
//!
//! # Examples
//!
//! ```text
//! proxmox_status: running                      # Running guests
//! !osFamily: windows                           # Everything except Windows
//! proxmox_node: pve1,pve2                      # Guests on either host
//! tags: web+production,staging                 # Production web nodes or staging
//! hostname: dev.*                              # Hostnames containing "dev"
//! proxmox_type: qemu proxmox_status: running   # Running VMs
//! web1                                         # The node named web1
//! ```

pub mod matcher;
pub mod parser;

pub use matcher::{evaluate, filter_nodes};
pub use parser::{
    ClauseValues, FilterClause, FilterExpression, TagGroup, TagGroupKind, parse_filter,
};
