// ===============================
// src/item.rs
// ===============================
//
// SKU string <-> atribut item TF2.
// Format: "defindex;quality[;u<effect>][;australium][;uncraftable][;w<wear>]
//          [;pk<paintkit>][;strange][;kt-<n>][;td-<n>][;festive][;n<n>][;c<n>]
//          [;od-<n>][;oq-<n>]"
// Contoh: "5021;6" (key), "378;5;u13" (unusual dengan effect 13).
//
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub defindex: u32,
    pub quality: u32,
    pub craftable: bool,
    pub killstreak: u32,
    pub australium: bool,
    pub effect: Option<u32>,
    pub festive: bool,
    pub paintkit: Option<u32>,
    pub wear: Option<u32>,
    pub quality2: Option<u32>,
    pub craftnumber: Option<u32>,
    pub crateseries: Option<u32>,
    pub target: Option<u32>,
    pub output: Option<u32>,
    pub output_quality: Option<u32>,
}

const STRANGE_QUALITY: u32 = 11;

impl Item {
    pub fn new(defindex: u32, quality: u32) -> Self {
        Self { defindex, quality, craftable: true, ..Default::default() }
    }

    /// None kalau bukan SKU TF2 yang valid (mis. "unknown").
    pub fn from_sku(sku: &str) -> Option<Self> {
        let mut parts = sku.split(';');
        let defindex = parts.next()?.parse().ok()?;
        let quality = parts.next()?.parse().ok()?;
        let mut item = Item::new(defindex, quality);

        for attr in parts {
            if attr == "australium" {
                item.australium = true;
            } else if attr == "uncraftable" {
                item.craftable = false;
            } else if attr == "strange" {
                item.quality2 = Some(STRANGE_QUALITY);
            } else if attr == "festive" {
                item.festive = true;
            } else if let Some(v) = attr.strip_prefix("kt-") {
                item.killstreak = v.parse().ok()?;
            } else if let Some(v) = attr.strip_prefix("td-") {
                item.target = Some(v.parse().ok()?);
            } else if let Some(v) = attr.strip_prefix("od-") {
                item.output = Some(v.parse().ok()?);
            } else if let Some(v) = attr.strip_prefix("oq-") {
                item.output_quality = Some(v.parse().ok()?);
            } else if let Some(v) = attr.strip_prefix("pk") {
                item.paintkit = Some(v.parse().ok()?);
            } else if let Some(v) = attr.strip_prefix('u') {
                item.effect = Some(v.parse().ok()?);
            } else if let Some(v) = attr.strip_prefix('w') {
                item.wear = Some(v.parse().ok()?);
            } else if let Some(v) = attr.strip_prefix('n') {
                item.craftnumber = Some(v.parse().ok()?);
            } else if let Some(v) = attr.strip_prefix('c') {
                item.crateseries = Some(v.parse().ok()?);
            } else {
                return None;
            }
        }
        Some(item)
    }

    /// Effect non-zero (unusual) -> kandidat dupe check.
    pub fn has_effect(&self) -> bool {
        matches!(self.effect, Some(e) if e != 0)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.defindex, self.quality)?;
        if let Some(e) = self.effect {
            write!(f, ";u{e}")?;
        }
        if self.australium {
            f.write_str(";australium")?;
        }
        if !self.craftable {
            f.write_str(";uncraftable")?;
        }
        if let Some(w) = self.wear {
            write!(f, ";w{w}")?;
        }
        if let Some(pk) = self.paintkit {
            write!(f, ";pk{pk}")?;
        }
        if self.quality2 == Some(STRANGE_QUALITY) {
            f.write_str(";strange")?;
        }
        if self.killstreak != 0 {
            write!(f, ";kt-{}", self.killstreak)?;
        }
        if let Some(t) = self.target {
            write!(f, ";td-{t}")?;
        }
        if self.festive {
            f.write_str(";festive")?;
        }
        if let Some(n) = self.craftnumber {
            write!(f, ";n{n}")?;
        }
        if let Some(c) = self.crateseries {
            write!(f, ";c{c}")?;
        }
        if let Some(o) = self.output {
            write!(f, ";od-{o}")?;
        }
        if let Some(oq) = self.output_quality {
            write!(f, ";oq-{oq}")?;
        }
        Ok(())
    }
}
