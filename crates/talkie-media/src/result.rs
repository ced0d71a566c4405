//! Result file detection in inference output.
//!
//! The inference tool reports its artifact only by printing a line such as
//! `./results/2024_01_01_12.30.00.mp4` on stdout. The grammar is
//! `./results/YYYY_MM_DD_HH.MM.SS.mp4` terminated by a newline (CRLF
//! accepted) or the end of output. Only the bare file name is kept.

use std::sync::LazyLock;

use regex::Regex;

/// Pattern matched against captured stdout.
const RESULT_PATTERN: &str =
    r"\./results/(\d{4}_\d{2}_\d{2}_\d{2}\.\d{2}\.\d{2}\.mp4)(?:\r?\n|$)";

static RESULT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RESULT_PATTERN).expect("result pattern is valid"));

/// Extract the first result file name from inference stdout.
pub fn parse_result_file(stdout: &str) -> Option<String> {
    RESULT_LINE
        .captures(stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_results_prefix() {
        assert_eq!(
            parse_result_file("./results/2024_01_01_12.30.00.mp4\n").as_deref(),
            Some("2024_01_01_12.30.00.mp4")
        );
    }

    #[test]
    fn test_finds_line_inside_log_noise() {
        let stdout = "using safetensor as default\n\
                      3DMM Extraction for source image\n\
                      face enhancer....: 100%|##########| 130/130\n\
                      The generated video is named: ./results/2023_11_05_09.07.42.mp4\n\
                      done\n";
        assert_eq!(
            parse_result_file(stdout).as_deref(),
            Some("2023_11_05_09.07.42.mp4")
        );
    }

    #[test]
    fn test_accepts_crlf_and_end_of_output() {
        assert_eq!(
            parse_result_file("./results/2024_02_03_04.05.06.mp4\r\n").as_deref(),
            Some("2024_02_03_04.05.06.mp4")
        );
        assert_eq!(
            parse_result_file("./results/2024_02_03_04.05.06.mp4").as_deref(),
            Some("2024_02_03_04.05.06.mp4")
        );
    }

    #[test]
    fn test_first_match_wins() {
        let stdout = "./results/2024_01_01_00.00.01.mp4\n./results/2024_01_01_00.00.02.mp4\n";
        assert_eq!(
            parse_result_file(stdout).as_deref(),
            Some("2024_01_01_00.00.01.mp4")
        );
    }

    #[test]
    fn test_rejects_other_shapes() {
        for stdout in [
            "",
            "finished without output\n",
            "./results/2024_01_01_12.30.00.avi\n",
            "./results/2024-01-01_12.30.00.mp4\n",
            "./results/24_01_01_12.30.00.mp4\n",
            "./output/2024_01_01_12.30.00.mp4\n",
            "./results/2024_01_01_12.30.00.mp4.tmp\n",
        ] {
            assert_eq!(parse_result_file(stdout), None, "{stdout:?}");
        }
    }
}
