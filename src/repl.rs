//! Console tuning REPL.
//!
//! A thin interactive wrapper over the store for bench tuning: one status
//! line, one command per line. Every mutation goes through the store, so
//! the pipeline and streaming connections pick changes up at their next
//! snapshot with no extra plumbing.
//!
//! Commands: `M` toggles the mask view, `B`/`E` set brightness and
//! absolute exposure, `LH`/`LS`/`LL`/`HH`/`HS`/`HL` set threshold bounds,
//! `Q` sets JPEG quality, `F` sets the frame rate, and an empty line arms
//! the one-shot frame capture. Unparsable input is ignored and the prompt
//! repeats.

use std::io::{BufRead, Write};

use anyhow::Result;

use crate::store::TuningStore;

/// Drive the REPL until the input reaches EOF.
pub fn run<R: BufRead, W: Write>(store: &TuningStore, mut input: R, mut output: W) -> Result<()> {
    loop {
        writeln!(output, "{}", status_line(store))?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }

        match line.trim().to_uppercase().as_str() {
            "M" => store.set_display_mask(!store.display_mask()),
            "E" => {
                if let Some(v) = prompt_value(&mut input, &mut output, "New Absolute Exposure Value: ")? {
                    store.set_absolute_exposure(v);
                }
            }
            "B" => {
                if let Some(v) = prompt_value(&mut input, &mut output, "New brightness value: ")? {
                    store.set_brightness(v);
                }
            }
            "LH" => {
                if let Some(v) = prompt_value(&mut input, &mut output, "New Low Threshold Hue value: ")? {
                    store.set_threshold_low_h(v);
                }
            }
            "LS" => {
                if let Some(v) =
                    prompt_value(&mut input, &mut output, "New Low Threshold Saturation value: ")?
                {
                    store.set_threshold_low_s(v);
                }
            }
            "LL" => {
                if let Some(v) =
                    prompt_value(&mut input, &mut output, "New Low Threshold Luminance value: ")?
                {
                    store.set_threshold_low_l(v);
                }
            }
            "HH" => {
                if let Some(v) = prompt_value(&mut input, &mut output, "New High Threshold Hue value: ")? {
                    store.set_threshold_high_h(v);
                }
            }
            "HS" => {
                if let Some(v) =
                    prompt_value(&mut input, &mut output, "New High Threshold Saturation value: ")?
                {
                    store.set_threshold_high_s(v);
                }
            }
            "HL" => {
                if let Some(v) =
                    prompt_value(&mut input, &mut output, "New High Threshold Luminance value: ")?
                {
                    store.set_threshold_high_l(v);
                }
            }
            "Q" => {
                if let Some(v) = prompt_value(&mut input, &mut output, "New JPEG quality value: ")? {
                    store.set_quality(v);
                }
            }
            "F" => {
                if let Some(v) = prompt_value(&mut input, &mut output, "New FPS value: ")? {
                    store.set_fps(v);
                }
            }
            "" => store.set_capture_next_frame(true),
            other => {
                writeln!(output, "unknown command '{other}'")?;
            }
        }
    }
}

fn status_line(store: &TuningStore) -> String {
    let t = store.threshold_snapshot();
    format!(
        "LH:{} LS:{} LL:{} HH:{} HS:{} HL:{} Quality:({}) Fps:({}) Mask:({}) Brightness:({}) Exposure:({})",
        t.low_h,
        t.low_s,
        t.low_l,
        t.high_h,
        t.high_s,
        t.high_l,
        store.quality(),
        store.fps(),
        store.display_mask(),
        store.brightness(),
        store.absolute_exposure()
    )
}

/// Prompt for one integer. EOF or an unparsable line yields `None`.
fn prompt_value<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> Result<Option<i64>> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(line.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_script(store: &TuningStore, script: &str) -> String {
        let mut output = Vec::new();
        run(store, script.as_bytes(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn mask_toggle_flips_display_mask() {
        let store = TuningStore::new();
        run_script(&store, "M\n");
        assert!(store.display_mask());
        run_script(&store, "M\n");
        assert!(!store.display_mask());
    }

    #[test]
    fn threshold_commands_prompt_and_set() {
        let store = TuningStore::new();
        let output = run_script(&store, "LH\n25\nHH\n45\n");
        assert!(output.contains("New Low Threshold Hue value: "));
        let t = store.threshold_snapshot();
        assert_eq!(t.low_h, 25);
        assert_eq!(t.high_h, 45);
    }

    #[test]
    fn quality_and_fps_commands_are_implemented() {
        let store = TuningStore::new();
        run_script(&store, "Q\n85\nF\n15\n");
        assert_eq!(store.quality(), 85);
        assert_eq!(store.fps(), 15);
    }

    #[test]
    fn empty_line_arms_one_shot_capture() {
        let store = TuningStore::new();
        run_script(&store, "\n");
        assert!(store.capture_next_frame());
    }

    #[test]
    fn unparsable_value_leaves_store_untouched() {
        let store = TuningStore::new();
        run_script(&store, "B\nbright\n");
        assert_eq!(store.brightness(), 120);
    }

    #[test]
    fn lowercase_commands_are_accepted() {
        let store = TuningStore::new();
        run_script(&store, "e\n9\n");
        assert_eq!(store.absolute_exposure(), 9);
    }

    #[test]
    fn status_line_reports_current_tunables() {
        let store = TuningStore::new();
        let output = run_script(&store, "");
        assert!(output.starts_with(
            "LH:20 LS:60 LL:40 HH:40 HS:255 HL:255 Quality:(50) Fps:(5) Mask:(false) Brightness:(120) Exposure:(6)"
        ));
    }
}
