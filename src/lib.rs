//! Kotonoha: a vertical-text novel workshop.
//!
//! Book content is free-form text. [`structure`] classifies it line by line,
//! [`anchor`] links table-of-contents entries to chapter headers and
//! [`layout`] turns the result into a right-to-left vertical presentation.
//! [`workshop`] drives the generative API and [`storage`] keeps the library.

pub mod anchor;
pub mod cancellation;
pub mod config;
pub mod generation;
pub mod layout;
pub mod model;
pub mod reader;
pub mod storage;
pub mod structure;
pub mod workshop;

use std::fs;
use std::path::Path;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Write TypeScript declarations for every type a UI exchanges with the core.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<model::Book>(out_dir)?;
    export_single_type::<model::BookPatch>(out_dir)?;
    export_single_type::<model::ChatRole>(out_dir)?;
    export_single_type::<model::ChatMessage>(out_dir)?;
    export_single_type::<model::Character>(out_dir)?;
    export_single_type::<model::Illustration>(out_dir)?;
    export_single_type::<model::Stamp>(out_dir)?;
    export_single_type::<structure::Zone>(out_dir)?;
    export_single_type::<structure::Segment>(out_dir)?;
    export_single_type::<anchor::AnchorEntry>(out_dir)?;
    export_single_type::<layout::FittedSize>(out_dir)?;
    export_single_type::<layout::WritingMode>(out_dir)?;
    export_single_type::<layout::ParagraphStyle>(out_dir)?;
    export_single_type::<layout::ScrollBehavior>(out_dir)?;
    export_single_type::<layout::ScrollAlign>(out_dir)?;
    export_single_type::<layout::ScrollTarget>(out_dir)?;
    export_single_type::<layout::Block>(out_dir)?;
    export_single_type::<layout::StampOverlay>(out_dir)?;
    export_single_type::<layout::Presentation>(out_dir)?;
    export_single_type::<reader::PreviewView>(out_dir)?;
    export_single_type::<reader::ReaderSnapshot>(out_dir)?;

    let index_content = r#"export type { Book } from "./Book";
export type { BookPatch } from "./BookPatch";
export type { ChatRole } from "./ChatRole";
export type { ChatMessage } from "./ChatMessage";
export type { Character } from "./Character";
export type { Illustration } from "./Illustration";
export type { Stamp } from "./Stamp";
export type { Zone } from "./Zone";
export type { Segment } from "./Segment";
export type { AnchorEntry } from "./AnchorEntry";
export type { FittedSize } from "./FittedSize";
export type { WritingMode } from "./WritingMode";
export type { ParagraphStyle } from "./ParagraphStyle";
export type { ScrollBehavior } from "./ScrollBehavior";
export type { ScrollAlign } from "./ScrollAlign";
export type { ScrollTarget } from "./ScrollTarget";
export type { Block } from "./Block";
export type { StampOverlay } from "./StampOverlay";
export type { Presentation } from "./Presentation";
export type { PreviewView } from "./PreviewView";
export type { ReaderSnapshot } from "./ReaderSnapshot";
"#;

    fs::write(out_dir.join("index.ts"), index_content).map_err(|err| {
        format!(
            "Failed to write {}: {err}",
            out_dir.join("index.ts").display()
        )
    })?;

    Ok(())
}
