use anyhow::{Result, ensure};
use candle_core::{DType, Tensor};

/// Mean of `hidden` (`[B,T,H]`) over the positions set in `attention_mask`
/// (`[B,T]`), each row scaled to unit L2 norm. Returns `[B,H]`.
/// A row with an all-zero mask pools to zeros.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _, width) = hidden.dims3()?;
    ensure!(
        attention_mask.dims() == &hidden.dims()[..2],
        "mask shape {:?} does not match hidden {:?}",
        attention_mask.dims(),
        hidden.dims()
    );
    let eps = match hidden.dtype() { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 };

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?.maximum(1.0)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(eps)?;
    let pooled = mean.broadcast_div(&norms)?;
    ensure!(pooled.dims() == [batch, width].as_slice(), "pooled shape mismatch: {:?}", pooled.dims());
    Ok(pooled)
}
