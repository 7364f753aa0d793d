//! Indexed datasets of PSD features and ideal binary masks.
//!
//! One row of the paired manifests is one utterance recorded by one
//! microphone. [`IbmDataset`] serves either one row per item
//! ([`ChannelLayout::Single`], 2-D tensors) or `n` consecutive rows per item
//! ([`ChannelLayout::Grouped`], 3-D tensors stacked channel-first).
//!
//! Items are computed from the WAV files on every access. Wrap a dataset in
//! [`CachedDataset`] to keep them in memory instead.

use anyhow::{ensure, Context, Result};
use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::config::DatasetConfig;
use crate::error::DatasetError;
use crate::ibm::{StftIbm, WavToIbm};
use crate::manifest::{ManifestEntry, ManifestPair};

/// Microphones per utterance in a CHiME-style multichannel manifest
pub const DEFAULT_CHANNELS: usize = 6;

/// Length plus positional access, the contract batching loops consume.
pub trait IndexedDataset: Send + Sync {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item at `index`; fails with [`DatasetError::IndexOutOfRange`] when
    /// `index >= len()`.
    fn get(&self, index: usize) -> Result<Self::Item>;
}

impl<D: IndexedDataset + ?Sized> IndexedDataset for Box<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        (**self).get(index)
    }
}

/// Feature and masks for one item.
///
/// Single-channel tensors are `[n_frames, n_bins]`; grouped tensors are
/// `[channels, n_frames, n_bins]`.
#[derive(Debug, Clone)]
pub struct IbmItem {
    /// Noisy power spectrum
    pub psd: Tensor,
    pub target_mask: Tensor,
    pub noise_mask: Tensor,
}

/// How manifest rows map to dataset items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// One row per item
    Single,
    /// `n` consecutive rows per item
    Grouped(usize),
}

impl ChannelLayout {
    /// `1` maps to [`ChannelLayout::Single`], anything larger to a group.
    pub fn from_channels(channels: usize) -> Result<Self> {
        match channels {
            0 => Err(DatasetError::EmptyChannelGroup.into()),
            1 => Ok(Self::Single),
            n => Ok(Self::Grouped(n)),
        }
    }

    pub fn rows_per_item(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Grouped(n) => *n,
        }
    }
}

/// Dataset over a clean/noisy manifest pair.
pub struct IbmDataset<C = StftIbm> {
    manifests: ManifestPair,
    layout: ChannelLayout,
    converter: C,
    device: Device,
}

impl IbmDataset<StftIbm> {
    /// One utterance per item, default mask settings.
    pub fn single<P: AsRef<Path>, Q: AsRef<Path>>(clean: P, noisy: Q) -> Result<Self> {
        let manifests = ManifestPair::load(clean, noisy)?;
        Self::with_converter(manifests, ChannelLayout::Single, StftIbm::new(Default::default())?)
    }

    /// `channels` consecutive rows per item, default mask settings.
    ///
    /// A single channel yields the same 2-D items as [`IbmDataset::single`].
    pub fn multichannel<P: AsRef<Path>, Q: AsRef<Path>>(
        clean: P,
        noisy: Q,
        channels: usize,
    ) -> Result<Self> {
        let layout = ChannelLayout::from_channels(channels)?;
        let manifests = ManifestPair::load(clean, noisy)?;
        Self::with_converter(manifests, layout, StftIbm::new(Default::default())?)
    }
}

impl<C: WavToIbm> IbmDataset<C> {
    pub fn with_converter(
        manifests: ManifestPair,
        layout: ChannelLayout,
        converter: C,
    ) -> Result<Self> {
        let rows_per_item = layout.rows_per_item();
        ensure!(rows_per_item > 0, DatasetError::EmptyChannelGroup);

        let rows = manifests.len();
        let leftover = rows % rows_per_item;
        if leftover != 0 {
            tracing::warn!(
                rows,
                group = rows_per_item,
                "ignoring {} trailing row(s) that do not fill a channel group",
                leftover
            );
        }
        tracing::info!(rows, items = rows / rows_per_item, ?layout, "loaded manifests");

        Ok(Self {
            manifests,
            layout,
            converter,
            device: Device::Cpu,
        })
    }

    /// Place output tensors on `device` (CPU by default).
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn manifests(&self) -> &ManifestPair {
        &self.manifests
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// The (clean, noisy) manifest rows behind item `index`, in channel order.
    pub fn entries(&self, index: usize) -> Option<Vec<(&ManifestEntry, &ManifestEntry)>> {
        if index >= self.len() {
            return None;
        }
        let n = self.layout.rows_per_item();
        (index * n..(index + 1) * n)
            .map(|row| self.manifests.get(row))
            .collect()
    }

    /// Convert one manifest row into time-major `[n_frames, n_bins]` tensors.
    fn load_row(&self, row: usize) -> Result<IbmItem> {
        let len = self.manifests.len();
        let (clean, noisy) = self
            .manifests
            .get(row)
            .ok_or(DatasetError::IndexOutOfRange { index: row, len })?;

        let features = self.converter.convert(&clean.path, &noisy.path)?;
        let time_major = |t: Tensor| -> Result<Tensor> {
            Ok(t.t()?.contiguous()?.to_device(&self.device)?)
        };
        let item = IbmItem {
            psd: time_major(features.noisy_psd)?,
            target_mask: time_major(features.target_mask)?,
            noise_mask: time_major(features.noise_mask)?,
        };

        let frames = item.psd.dims()[0];
        ensure!(
            item.target_mask.dims()[0] == frames && item.noise_mask.dims()[0] == frames,
            "utterance {}: feature has {} frames but masks have {} and {}",
            noisy.utterance_id,
            frames,
            item.target_mask.dims()[0],
            item.noise_mask.dims()[0]
        );
        Ok(item)
    }

    fn load_group(&self, index: usize, channels: usize) -> Result<IbmItem> {
        let mut psds: Vec<Tensor> = Vec::with_capacity(channels);
        let mut target_masks = Vec::with_capacity(channels);
        let mut noise_masks = Vec::with_capacity(channels);

        for channel in 0..channels {
            let item = self.load_row(index * channels + channel)?;
            if let Some(first) = psds.first() {
                let expected = first.dims()[0];
                let frames = item.psd.dims()[0];
                if frames != expected {
                    return Err(DatasetError::ChannelFrameMismatch {
                        index,
                        channel,
                        frames,
                        expected,
                    }
                    .into());
                }
            }
            psds.push(item.psd);
            target_masks.push(item.target_mask);
            noise_masks.push(item.noise_mask);
        }

        Ok(IbmItem {
            psd: Tensor::stack(&psds, 0)?,
            target_mask: Tensor::stack(&target_masks, 0)?,
            noise_mask: Tensor::stack(&noise_masks, 0)?,
        })
    }
}

impl<C: WavToIbm> IndexedDataset for IbmDataset<C> {
    type Item = IbmItem;

    fn len(&self) -> usize {
        self.manifests.len() / self.layout.rows_per_item()
    }

    fn get(&self, index: usize) -> Result<IbmItem> {
        let len = self.len();
        if index >= len {
            return Err(DatasetError::IndexOutOfRange { index, len }.into());
        }
        tracing::debug!(index, "loading item");

        let item = match self.layout {
            ChannelLayout::Single => self.load_row(index),
            ChannelLayout::Grouped(n) => self.load_group(index, n),
        };
        item.with_context(|| format!("Failed to load item {index}"))
    }
}

/// Memoizes the items of an inner dataset by index.
pub struct CachedDataset<D: IndexedDataset> {
    inner: D,
    cache: Mutex<HashMap<usize, D::Item>>,
}

impl<D> CachedDataset<D>
where
    D: IndexedDataset,
    D::Item: Clone + Send,
{
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Number of items currently held
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl<D> IndexedDataset for CachedDataset<D>
where
    D: IndexedDataset,
    D::Item: Clone + Send,
{
    type Item = D::Item;

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, index: usize) -> Result<D::Item> {
        if let Some(item) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(&index) {
            return Ok(item.clone());
        }

        // Computed outside the lock; concurrent misses on one index both convert.
        let item = self.inner.get(index)?;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index, item.clone());
        Ok(item)
    }
}

impl DatasetConfig {
    /// Build the dataset this config describes.
    pub fn build(&self) -> Result<Box<dyn IndexedDataset<Item = IbmItem>>> {
        let layout = ChannelLayout::from_channels(self.channels)?;
        let manifests = ManifestPair::load(&self.clean_manifest, &self.noisy_manifest)?;
        let converter = StftIbm::new(self.ibm.clone())?;
        let dataset = IbmDataset::with_converter(manifests, layout, converter)?;

        if self.cache {
            Ok(Box::new(CachedDataset::new(dataset)))
        } else {
            Ok(Box::new(dataset))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibm::IbmFeatures;
    use crate::manifest::Manifest;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Frames per utterance are read from the numeric suffix of the noisy
    /// file name (`u_7.wav` -> 7 frames) so tests can vary lengths.
    struct FakeIbm {
        bins: usize,
        calls: AtomicUsize,
    }

    impl FakeIbm {
        fn new(bins: usize) -> Self {
            Self {
                bins,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl WavToIbm for FakeIbm {
        fn convert(&self, _clean: &Path, noisy: &Path) -> Result<IbmFeatures> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let frames: usize = noisy
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.rsplit('_').next())
                .and_then(|s| s.parse().ok())
                .unwrap_or(3);
            let t = |v: f32| Tensor::full(v, (self.bins, frames), &Device::Cpu);
            Ok(IbmFeatures {
                noisy_psd: t(2.0)?,
                clean_psd: t(1.0)?,
                noise_psd: t(1.0)?,
                target_mask: t(1.0)?,
                noise_mask: t(0.0)?,
            })
        }
    }

    fn pair(frames: &[usize]) -> ManifestPair {
        let rows = |dir: &str| {
            Manifest::new(
                frames
                    .iter()
                    .enumerate()
                    .map(|(i, f)| {
                        let path = PathBuf::from(format!("{dir}/u_{f}.wav"));
                        ManifestEntry::new(format!("U{i}"), path)
                    })
                    .collect(),
            )
        };
        ManifestPair::new(rows("clean"), rows("noisy")).unwrap()
    }

    fn dataset(frames: &[usize], layout: ChannelLayout, bins: usize) -> IbmDataset<FakeIbm> {
        IbmDataset::with_converter(pair(frames), layout, FakeIbm::new(bins)).unwrap()
    }

    #[test]
    fn test_layout_from_channels() {
        assert_eq!(ChannelLayout::from_channels(1).unwrap(), ChannelLayout::Single);
        assert_eq!(ChannelLayout::from_channels(6).unwrap(), ChannelLayout::Grouped(6));
        assert!(ChannelLayout::from_channels(0).is_err());
        assert_eq!(ChannelLayout::Grouped(4).rows_per_item(), 4);
    }

    #[test]
    fn test_single_len_and_shapes() {
        let ds = dataset(&[5, 7], ChannelLayout::Single, 9);
        assert_eq!(ds.len(), 2);
        assert!(!ds.is_empty());

        let item = ds.get(1).unwrap();
        assert_eq!(item.psd.dims(), &[7, 9]);
        assert_eq!(item.target_mask.dims(), &[7, 9]);
        assert_eq!(item.noise_mask.dims(), &[7, 9]);
    }

    #[test]
    fn test_out_of_range() {
        let ds = dataset(&[5, 7], ChannelLayout::Single, 9);
        let err = ds.get(2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(ds.entries(2).is_none());
    }

    #[test]
    fn test_grouped_len_floors() {
        let ds = dataset(&[4; 14], ChannelLayout::Grouped(6), 3);
        assert_eq!(ds.len(), 2);
        assert!(ds.get(2).is_err());
    }

    #[test]
    fn test_grouped_stacks_channels() {
        let frames = [4, 4, 4, 8, 8, 8];
        let ds = dataset(&frames, ChannelLayout::Grouped(3), 5);
        let item = ds.get(1).unwrap();
        assert_eq!(item.psd.dims(), &[3, 8, 5]);
        assert_eq!(item.target_mask.dims(), &[3, 8, 5]);
        assert_eq!(item.noise_mask.dims(), &[3, 8, 5]);
        assert_eq!(ds.converter().calls.load(Ordering::SeqCst), 3);

        let rows = ds.entries(1).unwrap();
        let ids: Vec<&str> = rows.iter().map(|(c, _)| c.utterance_id.as_str()).collect();
        assert_eq!(ids, ["U3", "U4", "U5"]);
    }

    #[test]
    fn test_grouped_channel_frame_mismatch() {
        let ds = dataset(&[4, 5], ChannelLayout::Grouped(2), 5);
        let err = ds.get(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::ChannelFrameMismatch {
                channel: 1,
                frames: 5,
                expected: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_access_is_uncached() {
        let ds = dataset(&[3], ChannelLayout::Single, 2);
        ds.get(0).unwrap();
        ds.get(0).unwrap();
        assert_eq!(ds.converter().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cached_dataset_memoizes() {
        let ds = dataset(&[3, 4], ChannelLayout::Single, 2);
        let cached = CachedDataset::new(ds);
        assert_eq!(cached.len(), 2);

        let a = cached.get(1).unwrap();
        let b = cached.get(1).unwrap();
        assert_eq!(a.psd.dims(), b.psd.dims());
        assert_eq!(cached.inner().converter().calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cached_len(), 1);

        assert!(cached.get(5).is_err());
        assert_eq!(cached.cached_len(), 1);

        cached.clear();
        cached.get(1).unwrap();
        assert_eq!(cached.inner().converter().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_boxed_dataset() {
        let ds: Box<dyn IndexedDataset<Item = IbmItem>> =
            Box::new(dataset(&[3, 3], ChannelLayout::Single, 2));
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(0).unwrap().psd.dims(), &[3, 2]);
    }

    #[test]
    fn test_with_device_places_tensors() {
        let ds = dataset(&[4, 4], ChannelLayout::Grouped(2), 3).with_device(Device::Cpu);
        let item = ds.get(0).unwrap();
        assert!(item.psd.device().is_cpu());
        assert!(item.target_mask.device().is_cpu());
        assert!(item.noise_mask.device().is_cpu());
        assert_eq!(item.psd.dims(), &[2, 4, 3]);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_trailing_rows_are_logged() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let ds = tracing::subscriber::with_default(subscriber, || {
            dataset(&[3; 7], ChannelLayout::Grouped(3), 2)
        });
        assert_eq!(ds.len(), 2);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("ignoring 1 trailing row(s)"), "{output}");
    }

    #[test]
    fn test_full_groups_do_not_warn() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            dataset(&[3; 6], ChannelLayout::Grouped(3), 2)
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(!output.contains("trailing"), "{output}");
        assert!(output.contains("loaded manifests"), "{output}");
    }
}
