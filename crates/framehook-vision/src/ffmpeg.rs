//! ffmpeg 기반 비디오 디코더.
//!
//! ffmpeg 자식 프로세스가 입력을 `fps`로 샘플링해 rgb24 raw 프레임을 stdout으로
//! 내보내면, 읽기 스레드가 프레임 단위로 잘라 `VideoSource`에 공급한다.
//! 출력 크기를 설정하지 않으면 stderr의 `Stream ... Video: ... WxH` 줄에서 읽는다.

use framehook_core::config::SourceConfig;
use framehook_core::error::CoreError;
use framehook_core::models::frame::Dimensions;
use image::RgbaImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::source::VideoSource;

/// 테스트용 lavfi 입력 (1280x720, 30fps, 10초)
pub const FFMPEG_TEST_INPUT: &str = "testsrc=duration=10:size=1280x720:rate=30";

static OUTPUT_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"  Stream .* Video: .* (\d+)x(\d+),? ").expect("출력 크기 정규식")
});

/// ffmpeg 입력 설정
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    /// ffmpeg 실행 파일
    pub exe: String,
    /// `-i` 인자 (파일 경로, URL, lavfi 그래프 등)
    pub input: String,
    /// `-f` 입력 포맷
    pub format: Option<String>,
    /// 샘플링 프레임레이트
    pub fps: f64,
    /// 출력 크기 (지정하면 scale 필터 추가)
    pub size: Option<Dimensions>,
}

impl FfmpegInput {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            exe: "ffmpeg".to_string(),
            input: input.into(),
            format: None,
            fps: 2.0,
            size: None,
        }
    }

    /// lavfi 테스트 패턴 입력
    pub fn test_pattern() -> Self {
        Self {
            format: Some("lavfi".to_string()),
            ..Self::new(FFMPEG_TEST_INPUT)
        }
    }

    /// 소스 설정에서 생성 (`path` 필수)
    pub fn from_config(config: &SourceConfig) -> Result<Self, CoreError> {
        let input = config.path.clone().ok_or_else(|| {
            CoreError::Configuration("비디오 소스에는 source.path가 필요함".to_string())
        })?;
        Ok(Self {
            exe: config.ffmpeg_exe.clone(),
            input,
            format: config.input_format.clone(),
            fps: config.fps,
            size: config.size,
        })
    }

    /// ffmpeg 명령 구성
    pub fn command(&self) -> Command {
        let mut filter = format!("fps={}", self.fps);
        if let Some(size) = self.size {
            filter.push_str(&format!(",scale={}:{}", size.width, size.height));
        }

        let mut cmd = Command::new(&self.exe);
        cmd.arg("-hwaccel").arg("auto");
        if let Some(format) = &self.format {
            cmd.arg("-f").arg(format);
        }
        cmd.arg("-i")
            .arg(&self.input)
            .arg("-filter:v")
            .arg(filter)
            .arg("-vsync")
            .arg("drop")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-an")
            .arg("-y")
            .arg("pipe:1");
        cmd
    }
}

/// ffmpeg stderr 한 줄에서 출력 비디오 크기 추출
///
/// 예: `  Stream #0:0: Video: rawvideo (RGB[24] / 0x18424752), rgb24, 1280x720, q=2-31, 2 fps`
pub fn parse_output_size(line: &str) -> Option<Dimensions> {
    let captures = OUTPUT_SIZE.captures(line)?;
    let width = captures.get(1)?.as_str().parse().ok()?;
    let height = captures.get(2)?.as_str().parse().ok()?;
    Some(Dimensions::new(width, height))
}

/// rgb24 raw 버퍼 → RGBA 이미지 (알파 255)
pub fn rgb24_to_rgba(width: u32, height: u32, raw: &[u8]) -> Option<RgbaImage> {
    let mut rgba = Vec::with_capacity(raw.len() / 3 * 4);
    for px in raw.chunks_exact(3) {
        rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    RgbaImage::from_raw(width, height, rgba)
}

/// 실행 중인 ffmpeg 디코더
pub struct FfmpegDecoder {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<()>>,
}

/// ffmpeg를 띄우고 디코딩된 프레임을 `video`에 공급
pub fn spawn_decoder(input: &FfmpegInput, video: VideoSource) -> Result<FfmpegDecoder, CoreError> {
    let mut cmd = input.command();
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!("ffmpeg 명령: {:?}", cmd);

    let mut child = cmd.spawn().map_err(|e| {
        CoreError::Configuration(format!("ffmpeg 실행 실패 ({}): {e}", input.exe))
    })?;

    let stdin = child.stdin.take();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CoreError::Internal("ffmpeg stdout 없음".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| CoreError::Internal("ffmpeg stderr 없음".to_string()))?;

    let (size_tx, size_rx) = mpsc::channel::<Dimensions>();
    if let Some(size) = input.size {
        let _ = size_tx.send(size);
    }

    thread::Builder::new()
        .name("ffmpeg-stderr".into())
        .spawn(move || {
            let mut size_tx = Some(size_tx);
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                trace!("[ffmpeg] {}", line);
                if let Some(size) = parse_output_size(&line) {
                    if let Some(tx) = size_tx.take() {
                        debug!("ffmpeg 출력 크기: {}x{}", size.width, size.height);
                        let _ = tx.send(size);
                    }
                }
            }
        })?;

    let reader = thread::Builder::new()
        .name("ffmpeg-stdout".into())
        .spawn(move || read_frames(stdout, size_rx, video))?;

    info!("ffmpeg 디코더 시작: {} (fps={})", input.input, input.fps);

    Ok(FfmpegDecoder {
        child,
        stdin,
        reader: Some(reader),
    })
}

fn read_frames(mut stdout: impl Read, size_rx: mpsc::Receiver<Dimensions>, video: VideoSource) {
    let Ok(size) = size_rx.recv() else {
        warn!("ffmpeg 출력 크기를 알 수 없음, 디코딩 중단");
        video.end_of_stream();
        return;
    };

    let frame_len = size.width as usize * size.height as usize * 3;
    let mut buf = vec![0u8; frame_len];
    loop {
        match stdout.read_exact(&mut buf) {
            Ok(()) => match rgb24_to_rgba(size.width, size.height, &buf) {
                Some(image) => video.push_frame(image),
                None => {
                    warn!("프레임 버퍼 크기 불일치");
                    break;
                }
            },
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => {
                warn!("ffmpeg 출력 읽기 실패: {e}");
                break;
            }
        }
    }
    video.end_of_stream();
}

impl FfmpegDecoder {
    /// ffmpeg에 `q`를 보내 정상 종료시키고 읽기 스레드를 기다린다
    pub fn stop(&mut self) -> Result<(), CoreError> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.write_all(b"q\n") {
                debug!("ffmpeg stdin 쓰기 실패 (이미 종료됨): {e}");
            }
        }
        let status = self.child.wait()?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        info!("ffmpeg 디코더 종료: {status}");
        Ok(())
    }

    /// 입력이 끝나 ffmpeg가 스스로 종료될 때까지 대기
    pub fn wait(&mut self) -> Result<(), CoreError> {
        self.child.wait()?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        Ok(())
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
