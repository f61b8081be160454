//! 整合測試 - 以假的 MPlayer 驅動完整流程
//!
//! 假執行器依命令列決定輸出，擷取命令會在 `outdir=` 指定的目錄寫入真的 JPEG。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{Rgb, RgbImage};
use video_thumbs_maker::component::contact_sheet_generator::{
    KeyframeWaitSupport, OutputSpec, VideoThumbsMaker,
};
use video_thumbs_maker::config::ThumbsConfig;
use video_thumbs_maker::tools::{CommandRunner, RunError, RunLimits};

const INFO_640X480: &str = "\
ID_VIDEO_FORMAT=XVID
ID_VIDEO_WIDTH=640
ID_VIDEO_HEIGHT=480
ID_VIDEO_FPS=25.000
ID_LENGTH=120.00
ID_SEEKABLE=1
";

type Handler = Box<dyn Fn(&[String]) -> Result<String, RunError> + Send + Sync>;

struct FakeMplayer {
    handler: Handler,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeMplayer {
    fn new(handler: impl Fn(&[String]) -> Result<String, RunError> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn extraction_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| is_extraction(args))
            .collect()
    }
}

impl CommandRunner for FakeMplayer {
    fn run(&self, args: &[String], _limits: RunLimits) -> Result<String, RunError> {
        self.calls.lock().unwrap().push(args.to_vec());
        (self.handler)(args)
    }
}

fn is_extraction(args: &[String]) -> bool {
    args.iter().any(|a| a.starts_with("jpeg:"))
}

fn has_arg(args: &[String], wanted: &str) -> bool {
    args.iter().any(|a| a == wanted)
}

fn outdir(args: &[String]) -> PathBuf {
    args.iter()
        .find_map(|a| a.split_once("outdir=").map(|(_, dir)| PathBuf::from(dir)))
        .expect("擷取命令缺少 outdir")
}

fn frame(width: u32, height: u32, seed: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 7 + seed * 53) % 256) as u8,
            ((y * 5 + seed * 31) % 256) as u8,
            (((x + y) * 3 + seed * 17) % 256) as u8,
        ])
    })
}

fn write_frames(dir: &Path, count: u32, width: u32, height: u32) {
    for i in 1..=count {
        frame(width, height, i)
            .save(dir.join(format!("{i:08}.jpg")))
            .unwrap();
    }
}

fn maker(fake: FakeMplayer) -> VideoThumbsMaker<FakeMplayer> {
    VideoThumbsMaker::with_runner(ThumbsConfig::default(), fake)
}

fn leftover_entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

/// 測試 1: 標準流程（120 秒、640x480、4x3@160）
#[test]
fn test_reference_scenario() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("sheet.jpg");

    let maker = maker(FakeMplayer::new(|args| {
        if is_extraction(args) {
            write_frames(&outdir(args), 13, 160, 120);
            Ok("VO: [jpeg] 640x480 => 160x120 Planar YV12 \n".to_string())
        } else {
            Ok(INFO_640X480.to_string())
        }
    }));

    let result = maker
        .create_thumbnails(
            Path::new("/videos/a.avi"),
            temp_root.path(),
            &[OutputSpec::new(4, 3, 160, 2, &output)],
        )
        .unwrap();

    assert!(result.success);
    assert_eq!(result.duration_ms, Some(120_000));
    assert_eq!(result.frame_count, 13);
    assert_eq!(image::image_dimensions(&output).unwrap(), (652, 370));
    assert_eq!(leftover_entries(temp_root.path()), 0);

    let extraction = &maker.runner().extraction_calls()[0];
    for (flag, value) in [("-ss", "4"), ("-sstep", "8"), ("-frames", "13"), ("-vf", "scale=160:120")] {
        let pos = extraction.iter().position(|a| a == flag).unwrap();
        assert_eq!(extraction[pos + 1], value, "{flag}");
    }
}

/// 測試 2: 影片長度為 0 時不擷取、不輸出，並清除暫存目錄
#[test]
fn test_zero_duration_is_not_processed() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("sheet.jpg");

    let maker = maker(FakeMplayer::new(|_| {
        Ok("ID_VIDEO_WIDTH=640\nID_VIDEO_HEIGHT=480\nID_LENGTH=0.0\n".to_string())
    }));

    let result = maker
        .create_thumbnails(
            Path::new("/videos/empty.avi"),
            temp_root.path(),
            &[OutputSpec::new(4, 3, 160, 2, &output)],
        )
        .unwrap();

    assert!(!result.success);
    assert!(!output.exists());
    assert!(!result.work_dir.exists());
    assert_eq!(leftover_entries(temp_root.path()), 0);

    let calls = maker.runner().calls();
    assert_eq!(calls.len(), 2);
    assert!(has_arg(&calls[1], "-demuxer"));
    assert!(maker.runner().extraction_calls().is_empty());
}

/// 測試 3: 影格不足時依序放寬，共執行三次擷取
#[test]
fn test_relaxation_ladder_runs_three_extractions() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("sheet.jpg");

    let maker = maker(FakeMplayer::new(|args| {
        if is_extraction(args) {
            write_frames(&outdir(args), 2, 160, 120);
            Ok(String::new())
        } else {
            Ok(INFO_640X480.to_string())
        }
    }));

    let result = maker
        .create_thumbnails(
            Path::new("/videos/short.avi"),
            temp_root.path(),
            &[OutputSpec::new(5, 4, 160, 2, &output)],
        )
        .unwrap();

    let extractions = maker.runner().extraction_calls();
    assert_eq!(extractions.len(), 3);
    assert!(has_arg(&extractions[0], "-sstep"));
    assert!(!has_arg(&extractions[1], "-sstep"));
    assert!(has_arg(&extractions[2], "-sstep"));
    assert!(has_arg(&extractions[2], "-demuxer"));

    // 第三步後無論影格數都接受
    assert!(result.success);
    assert_eq!(result.frame_count, 2);
    assert!(output.exists());
}

/// 測試 4: 解碼錯誤時即使影格足夠也會重試
#[test]
fn test_decode_error_triggers_retry() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("sheet.jpg");

    let maker = maker(FakeMplayer::new(|args| {
        if is_extraction(args) {
            write_frames(&outdir(args), 13, 160, 120);
            if has_arg(args, "-sstep") {
                return Ok("[h264 @ 0x1] Error while decoding frame!\n".to_string());
            }
            Ok(String::new())
        } else {
            Ok(INFO_640X480.to_string())
        }
    }));

    let result = maker
        .create_thumbnails(
            Path::new("/videos/broken.mp4"),
            temp_root.path(),
            &[OutputSpec::new(4, 3, 160, 2, &output)],
        )
        .unwrap();

    assert!(result.success);
    assert_eq!(maker.runner().extraction_calls().len(), 2);
}

/// 測試 5: 不支援 wait_keyframe 時移除選項，且之後的呼叫都不再使用
#[test]
fn test_wait_keyframe_rejection_persists() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    let maker = maker(FakeMplayer::new(|args| {
        if !is_extraction(args) {
            return Ok(INFO_640X480.to_string());
        }
        if has_arg(args, "-lavdopts") {
            return Ok("Unknown suboption wait_keyframe\nError parsing option\n".to_string());
        }
        write_frames(&outdir(args), 13, 160, 120);
        Ok(String::new())
    }));

    for name in ["a", "b"] {
        let output = out_dir.path().join(format!("{name}.jpg"));
        let result = maker
            .create_thumbnails(
                &PathBuf::from(format!("/videos/{name}.avi")),
                temp_root.path(),
                &[OutputSpec::new(4, 3, 160, 2, &output)],
            )
            .unwrap();
        assert!(result.success);
    }

    let extractions = maker.runner().extraction_calls();
    assert_eq!(extractions.len(), 3);
    assert!(has_arg(&extractions[0], "-lavdopts"));
    assert!(!has_arg(&extractions[1], "-lavdopts"));
    assert!(!has_arg(&extractions[2], "-lavdopts"));
    // 移除選項的重跑仍是第一步，保留 -sstep
    assert!(has_arg(&extractions[1], "-sstep"));
    assert_eq!(maker.session().wait_keyframe(), KeyframeWaitSupport::Unsupported);
}

/// 測試 6: 實際解碼尺寸大於讀取值時，加入縮放濾鏡重跑
#[test]
fn test_rescale_on_real_geometry() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("sheet.jpg");

    let maker = maker(FakeMplayer::new(|args| {
        if !is_extraction(args) {
            return Ok("ID_VIDEO_WIDTH=160\nID_VIDEO_HEIGHT=120\nID_LENGTH=120.00\n".to_string());
        }
        if has_arg(args, "scale=160:90") {
            write_frames(&outdir(args), 13, 160, 90);
            Ok("VO: [jpeg] 320x180 => 160x90 Planar YV12 \n".to_string())
        } else {
            write_frames(&outdir(args), 13, 320, 180);
            Ok("VO: [jpeg] 320x180 => 320x180 Planar YV12 \n".to_string())
        }
    }));

    let result = maker
        .create_thumbnails(
            Path::new("/videos/anamorphic.mkv"),
            temp_root.path(),
            &[OutputSpec::new(4, 3, 160, 2, &output)],
        )
        .unwrap();

    let extractions = maker.runner().extraction_calls();
    assert_eq!(extractions.len(), 2);
    assert!(!has_arg(&extractions[0], "-vf"));
    assert!(has_arg(&extractions[1], "scale=160:90"));

    assert!(result.success);
    assert_eq!(result.frame_count, 13);
    assert_eq!(result.dimension.map(|d| (d.width, d.height)), Some((320, 180)));
    // 格子高度依修正後的比例：160 * 180 / 320 = 90
    assert_eq!(image::image_dimensions(&output).unwrap(), (652, 3 * 92 + 2 + 2));
}

/// 測試 7: 多張輸出中有一張失敗時，其餘仍會寫出
#[test]
fn test_partial_output_failure() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let good = out_dir.path().join("good.jpg");
    let bad = out_dir.path().join("missing_dir").join("bad.jpg");

    let maker = maker(FakeMplayer::new(|args| {
        if is_extraction(args) {
            write_frames(&outdir(args), 21, 200, 150);
            Ok(String::new())
        } else {
            Ok(INFO_640X480.to_string())
        }
    }));

    let result = maker
        .create_thumbnails(
            Path::new("/videos/a.avi"),
            temp_root.path(),
            &[
                OutputSpec::new(4, 3, 160, 2, &bad),
                OutputSpec::new(5, 4, 200, 0, &good),
            ],
        )
        .unwrap();

    assert!(result.success);
    assert_eq!(result.outputs.len(), 2);
    assert!(!result.outputs[0].is_written());
    assert!(result.outputs[1].is_written());
    assert!(!bad.exists());
    assert_eq!(image::image_dimensions(&good).unwrap(), (1002, 602));

    // 以最大的輸出需求取樣：20 格、最寬 200
    let extraction = &maker.runner().extraction_calls()[0];
    assert!(has_arg(extraction, "21"));
    assert!(has_arg(extraction, "scale=200:150"));
}

/// 測試 8: 無法啟動 MPlayer 時回傳錯誤，暫存目錄仍被刪除
#[test]
fn test_spawn_failure_is_an_error() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    let maker = maker(FakeMplayer::new(|args| {
        Err(RunError::Spawn {
            program: args[0].clone(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }));

    let result = maker.create_thumbnails(
        Path::new("/videos/a.avi"),
        temp_root.path(),
        &[OutputSpec::new(4, 3, 160, 2, &out_dir.path().join("s.jpg"))],
    );

    assert!(result.is_err());
    assert_eq!(leftover_entries(temp_root.path()), 0);
    assert!(maker.version().is_err());
}

/// 測試 9: 開啟內容檢查時剔除黑畫面與重複影格
#[test]
fn test_content_check_filters_frames() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("sheet.jpg");

    let config = ThumbsConfig {
        check_content: true,
        ..ThumbsConfig::default()
    };
    let maker = VideoThumbsMaker::with_runner(
        config,
        FakeMplayer::new(|args| {
            if !is_extraction(args) {
                return Ok(INFO_640X480.to_string());
            }
            let dir = outdir(args);
            let black = RgbImage::from_pixel(160, 120, Rgb([0, 0, 0]));
            let seeds = [0, 1, 1, 0, 2, 3, 3, 4, 0, 5, 6, 7, 8];
            for (i, seed) in seeds.iter().enumerate() {
                let path = dir.join(format!("{:08}.jpg", i + 1));
                if *seed == 0 {
                    black.save(path).unwrap();
                } else {
                    frame(160, 120, *seed).save(path).unwrap();
                }
            }
            Ok(String::new())
        }),
    );

    let result = maker
        .create_thumbnails(
            Path::new("/videos/a.avi"),
            temp_root.path(),
            &[OutputSpec::new(4, 3, 160, 2, &output)],
        )
        .unwrap();

    assert!(result.success);
    assert_eq!(result.frame_count, 8);
}

/// 測試 10: 同一個產生器可被多個執行緒同時使用
#[test]
fn test_concurrent_invocations() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    let maker = maker(FakeMplayer::new(|args| {
        if is_extraction(args) {
            write_frames(&outdir(args), 13, 160, 120);
            Ok(String::new())
        } else {
            Ok(INFO_640X480.to_string())
        }
    }));

    std::thread::scope(|scope| {
        for i in 0..4 {
            let maker = &maker;
            let temp_root = temp_root.path();
            let output = out_dir.path().join(format!("{i}.jpg"));
            scope.spawn(move || {
                let result = maker
                    .create_thumbnails(
                        &PathBuf::from(format!("/videos/{i}.avi")),
                        temp_root,
                        &[OutputSpec::new(4, 3, 160, 2, &output)],
                    )
                    .unwrap();
                assert!(result.success);
                assert_eq!(result.frame_count, 13);
            });
        }
    });

    let dirs: std::collections::HashSet<PathBuf> = maker
        .runner()
        .extraction_calls()
        .iter()
        .map(|args| outdir(args))
        .collect();
    assert_eq!(dirs.len(), 4);
    assert_eq!(leftover_entries(temp_root.path()), 0);
}

/// 測試 11: probe 保留暫存目錄並回傳 JSON 可序列化的結果
#[test]
fn test_probe_hands_over_work_dir() {
    let temp_root = tempfile::tempdir().unwrap();
    let maker = maker(FakeMplayer::new(|_| Ok(INFO_640X480.to_string())));

    let probe = maker.probe(Path::new("/videos/a.avi"), temp_root.path()).unwrap();
    assert!(probe.is_resolved());
    assert!(probe.work_dir.is_dir());

    let json = serde_json::to_value(&probe).unwrap();
    assert_eq!(json["duration_ms"], 120_000);
    assert_eq!(json["dimension"]["width"], 640);

    fs::remove_dir_all(&probe.work_dir).unwrap();
}

#[cfg(unix)]
/// 測試 12: 找不到檔案時改用符號連結，擷取也使用同一路徑
#[test]
fn test_symlink_fallback_used_for_extraction() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let video_dir = tempfile::tempdir().unwrap();
    let original = video_dir.path().join("vídeo com acentuação.avi");
    fs::write(&original, b"not really a video").unwrap();
    let output = out_dir.path().join("sheet.jpg");

    let original_arg = original.to_string_lossy().to_string();
    let maker = maker(FakeMplayer::new(move |args| {
        if args.last() == Some(&original_arg) {
            return Ok(format!("File not found: '{original_arg}'\n"));
        }
        if is_extraction(args) {
            write_frames(&outdir(args), 13, 160, 120);
            Ok(String::new())
        } else {
            Ok(INFO_640X480.to_string())
        }
    }));

    let result = maker
        .create_thumbnails(
            &original,
            temp_root.path(),
            &[OutputSpec::new(4, 3, 160, 2, &output)],
        )
        .unwrap();

    assert!(result.success);
    assert_ne!(result.input_file, original);
    assert!(result.input_file.starts_with(&result.work_dir));

    let extraction = &maker.runner().extraction_calls()[0];
    assert_eq!(
        extraction.last().map(PathBuf::from),
        Some(result.input_file.clone())
    );
    assert!(original.exists());
    assert_eq!(leftover_entries(temp_root.path()), 0);
}

/// 測試 13: 開啟短檔名查詢時，擷取沿用 `dir /x` 找到的 8.3 路徑
#[test]
fn test_short_name_fallback_used_for_extraction() {
    let temp_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let original = Path::new("/evidence/vídeo de câmera.avi").to_path_buf();
    let output = out_dir.path().join("sheet.jpg");

    let config = ThumbsConfig {
        short_name_lookup: true,
        ..ThumbsConfig::default()
    };
    let original_arg = original.to_string_lossy().to_string();
    let maker = VideoThumbsMaker::with_runner(
        config,
        FakeMplayer::new(move |args| {
            if args.first().map(String::as_str) == Some("cmd") {
                return Ok(
                    "05/03/2015  10:21       104.857.600 VDEODE~1.AVI vídeo de câmera.avi\n"
                        .to_string(),
                );
            }
            if args.last() == Some(&original_arg) {
                return Ok(format!("File not found: '{original_arg}'\n"));
            }
            if is_extraction(args) {
                write_frames(&outdir(args), 13, 160, 120);
                Ok(String::new())
            } else {
                Ok(INFO_640X480.to_string())
            }
        }),
    );

    let result = maker
        .create_thumbnails(
            &original,
            temp_root.path(),
            &[OutputSpec::new(4, 3, 160, 2, &output)],
        )
        .unwrap();

    let short = Path::new("/evidence").join("VDEODE~1.AVI");
    assert!(result.success);
    assert_eq!(result.input_file, short);
    assert!(!result.input_file.starts_with(&result.work_dir));

    let calls = maker.runner().calls();
    assert_eq!(
        calls
            .iter()
            .filter(|args| args.first().map(String::as_str) == Some("cmd"))
            .count(),
        1
    );
    let extraction = &maker.runner().extraction_calls()[0];
    assert_eq!(extraction.last().map(PathBuf::from), Some(short));
    assert!(output.exists());
    assert_eq!(leftover_entries(temp_root.path()), 0);
}
